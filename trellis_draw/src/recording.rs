// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-memory graphics context that records every operation.
//!
//! [`RecordingContext`] does not rasterise anything. It exists so tests and
//! tools can assert on the programs compiled and the state and draw
//! operations issued, in order.

use hashbrown::HashSet;
use trellis_data::Name;

use crate::context::{
    AttributeInput, CompiledProgram, DrawOp, GraphicsContext, ProgramDesc, ProgramId,
    ResourceContext, StateOp, UniformInput,
};

/// Event recorded by [`RecordingContext`].
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A program was compiled.
    CreateProgram {
        /// Handle handed out.
        id: ProgramId,
        /// Name of the pass it was compiled for.
        name: Name,
    },
    /// A program was released.
    DestroyProgram(ProgramId),
    /// A state operation was applied.
    State(StateOp),
    /// A draw operation was applied.
    Draw(DrawOp),
}

/// Recording implementation of [`GraphicsContext`].
///
/// Every declared program input is reported active, with locations assigned
/// in declaration order (uniforms and attributes numbered separately).
#[derive(Debug, Default)]
pub struct RecordingContext {
    programs: Vec<Option<ProgramDesc>>,
    failing: HashSet<Name>,
    events: Vec<Event>,
}

impl RecordingContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes compilation of programs for pass `name` fail.
    pub fn fail_program(&mut self, name: impl Into<Name>) {
        self.failing.insert(name.into());
    }

    /// Lets every program compile again.
    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Clears recorded events but keeps programs.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Returns the description of a live program.
    #[must_use]
    pub fn program(&self, id: ProgramId) -> Option<&ProgramDesc> {
        self.programs.get(id.0 as usize)?.as_ref()
    }

    /// Returns the number of live programs.
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.iter().flatten().count()
    }

    /// Returns the draw operations recorded since the last clear.
    pub fn draws(&self) -> impl Iterator<Item = &DrawOp> {
        self.events.iter().filter_map(|event| match event {
            Event::Draw(op) => Some(op),
            _ => None,
        })
    }

    /// Returns the state operations recorded since the last clear.
    pub fn states(&self) -> impl Iterator<Item = &StateOp> {
        self.events.iter().filter_map(|event| match event {
            Event::State(op) => Some(op),
            _ => None,
        })
    }
}

impl ResourceContext for RecordingContext {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<CompiledProgram, String> {
        if self.failing.contains(&desc.name) {
            return Err(format!("{}: forced compile failure", desc.name));
        }
        let id = u32::try_from(self.programs.len())
            .map(ProgramId)
            .map_err(|_| String::from("too many programs for u32 ProgramId"))?;
        let uniforms = (0_u32..)
            .zip(&desc.uniforms)
            .map(|(location, (name, kind))| UniformInput {
                name: name.clone(),
                location,
                kind: *kind,
            })
            .collect();
        let attributes = (0_u32..)
            .zip(&desc.attributes)
            .map(|(location, name)| AttributeInput {
                name: name.clone(),
                location,
            })
            .collect();
        self.programs.push(Some(desc.clone()));
        self.events.push(Event::CreateProgram {
            id,
            name: desc.name.clone(),
        });
        Ok(CompiledProgram {
            id,
            uniforms,
            attributes,
        })
    }

    fn destroy_program(&mut self, id: ProgramId) {
        if let Some(slot) = self.programs.get_mut(id.0 as usize) {
            *slot = None;
        }
        self.events.push(Event::DestroyProgram(id));
    }
}

impl GraphicsContext for RecordingContext {
    fn state(&mut self, op: StateOp) {
        self.events.push(Event::State(op));
    }

    fn draw(&mut self, op: DrawOp) {
        self.events.push(Event::Draw(op));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UniformKind;

    fn desc(name: &str) -> ProgramDesc {
        ProgramDesc {
            name: Name::new(name),
            vertex_source: String::new(),
            fragment_source: String::new(),
            defines: Vec::new(),
            uniforms: vec![
                (Name::new("a"), UniformKind::Float),
                (Name::new("b"), UniformKind::Mat4),
            ],
            attributes: vec![Name::new("position")],
        }
    }

    #[test]
    fn locations_follow_declaration_order() {
        let mut context = RecordingContext::new();
        let program = context.create_program(&desc("p")).unwrap();
        assert_eq!(program.uniforms[1].location, 1);
        assert_eq!(program.uniforms[1].kind, UniformKind::Mat4);
        assert_eq!(program.attributes[0].location, 0);
        assert_eq!(context.program(program.id).unwrap().name, "p");
    }

    #[test]
    fn destroyed_programs_are_released() {
        let mut context = RecordingContext::new();
        let a = context.create_program(&desc("a")).unwrap();
        let b = context.create_program(&desc("b")).unwrap();
        context.destroy_program(a.id);
        assert_eq!(context.program_count(), 1);
        assert!(context.program(a.id).is_none());
        assert!(context.program(b.id).is_some());
        assert_eq!(context.events().last(), Some(&Event::DestroyProgram(a.id)));
    }
}
