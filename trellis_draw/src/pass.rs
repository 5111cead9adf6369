// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Passes: a program template, its binding maps and its program cache.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use trellis_data::Name;

use crate::binding::{BindingMap, MacroBinding, MacroBindingMap};
use crate::context::{
    AttributeInput, CompiledProgram, ProgramDesc, ProgramId, ResourceContext, UniformInput,
    UniformKind,
};
use crate::error::DrawError;
use crate::resolver::BindingResolver;
use crate::signature::ProgramSignature;
use crate::states::default_states;

/// One compiled variant of a pass.
#[derive(Debug)]
pub struct Program {
    signature: ProgramSignature,
    compiled: CompiledProgram,
}

impl Program {
    /// Returns the backend handle.
    #[must_use]
    pub fn id(&self) -> ProgramId {
        self.compiled.id
    }

    /// Returns the signature the program was compiled for.
    #[must_use]
    pub fn signature(&self) -> &ProgramSignature {
        &self.signature
    }

    /// Returns the uniforms the program uses.
    #[must_use]
    pub fn uniforms(&self) -> &[UniformInput] {
        &self.compiled.uniforms
    }

    /// Returns the attributes the program uses.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeInput] {
        &self.compiled.attributes
    }
}

/// A shader pass.
///
/// Passes are immutable once built, except for the program cache, which holds
/// at most one [`Program`] per distinct [`ProgramSignature`]. The cache only
/// grows; [`clear_programs`](Self::clear_programs) empties it explicitly.
pub struct Pass {
    name: Name,
    vertex_source: String,
    fragment_source: String,
    uniforms: Vec<(Name, UniformKind)>,
    attributes: Vec<Name>,
    uniform_bindings: BindingMap,
    attribute_bindings: BindingMap,
    state_bindings: BindingMap,
    macro_bindings: MacroBindingMap,
    macros: Vec<(Name, MacroBinding)>,
    programs: RefCell<HashMap<ProgramSignature, Rc<Program>>>,
}

impl Pass {
    /// Starts building a pass.
    #[must_use]
    pub fn builder(name: impl Into<Name>) -> PassBuilder {
        PassBuilder {
            name: name.into(),
            vertex_source: String::new(),
            fragment_source: String::new(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
            uniform_bindings: BindingMap::new(),
            attribute_bindings: BindingMap::new(),
            state_bindings: BindingMap::new(),
            macro_bindings: MacroBindingMap::new(),
        }
    }

    /// Returns the pass name.
    #[must_use]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the declared uniforms.
    #[must_use]
    pub fn uniforms(&self) -> &[(Name, UniformKind)] {
        &self.uniforms
    }

    /// Returns the declared attributes.
    #[must_use]
    pub fn attributes(&self) -> &[Name] {
        &self.attributes
    }

    /// Returns the uniform bindings.
    #[must_use]
    pub fn uniform_bindings(&self) -> &BindingMap {
        &self.uniform_bindings
    }

    /// Returns the attribute bindings.
    #[must_use]
    pub fn attribute_bindings(&self) -> &BindingMap {
        &self.attribute_bindings
    }

    /// Returns the render state bindings. Their defaults cover every state.
    #[must_use]
    pub fn state_bindings(&self) -> &BindingMap {
        &self.state_bindings
    }

    /// Returns the macro bindings.
    #[must_use]
    pub fn macro_bindings(&self) -> &MacroBindingMap {
        &self.macro_bindings
    }

    /// Returns the macro bindings in slot order.
    #[must_use]
    pub fn macros(&self) -> &[(Name, MacroBinding)] {
        &self.macros
    }

    /// Returns the program matching the macros active for `resolver`,
    /// compiling it on first use.
    ///
    /// # Errors
    ///
    /// Fails if the signature cannot be computed or the context rejects the
    /// program. Compile failures are logged and not cached.
    pub fn select_program<C: ResourceContext + ?Sized>(
        &self,
        resolver: &BindingResolver<'_>,
        context: &mut C,
    ) -> Result<Rc<Program>, DrawError> {
        let signature =
            ProgramSignature::new(&self.macros, self.macro_bindings.defaults(), resolver)?;
        if let Some(program) = self.programs.borrow().get(&signature) {
            return Ok(program.clone());
        }

        let desc = ProgramDesc {
            name: self.name.clone(),
            vertex_source: self.vertex_source.clone(),
            fragment_source: self.fragment_source.clone(),
            defines: signature.defines().to_vec(),
            uniforms: self.uniforms.clone(),
            attributes: self.attributes.clone(),
        };
        let compiled = context.create_program(&desc).map_err(|message| {
            log::error!(
                "pass `{}`: failed to compile program for {signature:?}: {message}",
                self.name
            );
            DrawError::ProgramCompile {
                pass: self.name.clone(),
                message,
            }
        })?;
        log::debug!(
            "pass `{}`: compiled program {:?} for {signature:?}",
            self.name,
            compiled.id
        );

        let program = Rc::new(Program {
            signature: signature.clone(),
            compiled,
        });
        self.programs.borrow_mut().insert(signature, program.clone());
        Ok(program)
    }

    /// Returns the number of cached programs.
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.borrow().len()
    }

    /// Destroys every cached program.
    ///
    /// Draw units bound to one of them must be rebound before they render
    /// again, for instance with
    /// [`DrawUnitPool::invalidate_all`](crate::DrawUnitPool::invalidate_all).
    pub fn clear_programs<C: ResourceContext + ?Sized>(&self, context: &mut C) {
        let programs = core::mem::take(&mut *self.programs.borrow_mut());
        for program in programs.into_values() {
            context.destroy_program(program.id());
        }
    }
}

impl fmt::Debug for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("uniforms", &self.uniforms)
            .field("attributes", &self.attributes)
            .field("macros", &self.macros)
            .field("programs", &self.program_count())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Pass`].
#[derive(Debug)]
pub struct PassBuilder {
    name: Name,
    vertex_source: String,
    fragment_source: String,
    uniforms: Vec<(Name, UniformKind)>,
    attributes: Vec<Name>,
    uniform_bindings: BindingMap,
    attribute_bindings: BindingMap,
    state_bindings: BindingMap,
    macro_bindings: MacroBindingMap,
}

impl PassBuilder {
    /// Sets the vertex and fragment shader sources.
    #[must_use]
    pub fn sources(mut self, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.vertex_source = vertex.into();
        self.fragment_source = fragment.into();
        self
    }

    /// Declares a uniform input.
    #[must_use]
    pub fn uniform(mut self, name: impl Into<Name>, kind: UniformKind) -> Self {
        self.uniforms.push((name.into(), kind));
        self
    }

    /// Declares an attribute input.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<Name>) -> Self {
        self.attributes.push(name.into());
        self
    }

    /// Sets the uniform bindings.
    #[must_use]
    pub fn uniform_bindings(mut self, bindings: BindingMap) -> Self {
        self.uniform_bindings = bindings;
        self
    }

    /// Sets the attribute bindings.
    #[must_use]
    pub fn attribute_bindings(mut self, bindings: BindingMap) -> Self {
        self.attribute_bindings = bindings;
        self
    }

    /// Sets the render state bindings.
    #[must_use]
    pub fn state_bindings(mut self, bindings: BindingMap) -> Self {
        self.state_bindings = bindings;
        self
    }

    /// Sets the macro bindings.
    #[must_use]
    pub fn macro_bindings(mut self, bindings: MacroBindingMap) -> Self {
        self.macro_bindings = bindings;
        self
    }

    /// Builds the pass, filling in built-in defaults for every render state
    /// the state bindings do not default.
    ///
    /// # Errors
    ///
    /// Fails if copying a built-in default clashes with a same-named value of
    /// another type.
    pub fn build(self) -> Result<Pass, DrawError> {
        let macros = self.macro_bindings.sorted();
        let builtin = default_states();
        let defaults = self.state_bindings.defaults();
        for name in builtin.names() {
            if defaults.has_property(&name) {
                continue;
            }
            if let Some(value) = builtin.value(&name) {
                defaults.set_value(name, value)?;
            }
        }

        Ok(Pass {
            name: self.name,
            vertex_source: self.vertex_source,
            fragment_source: self.fragment_source,
            uniforms: self.uniforms,
            attributes: self.attributes,
            uniform_bindings: self.uniform_bindings,
            attribute_bindings: self.attribute_bindings,
            state_bindings: self.state_bindings,
            macro_bindings: self.macro_bindings,
            macros,
            programs: RefCell::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, MacroKind};
    use crate::recording::RecordingContext;
    use crate::states::{RenderState, priority};
    use trellis_data::{AggregateStore, EffectVariables, PropertyStore};

    fn lit_pass() -> Pass {
        Pass::builder("lit")
            .sources("void main() {}", "void main() {}")
            .uniform("diffuseColor", UniformKind::Float4)
            .attribute("position")
            .macro_bindings(MacroBindingMap::new().with_binding(
                "SHADOWS",
                MacroBinding::new(Binding::target("castShadows"), MacroKind::Bool),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn builtin_state_defaults_are_merged() {
        let states = BindingMap::new();
        states
            .defaults()
            .set(RenderState::Priority.name(), priority::TRANSPARENT)
            .unwrap();
        let pass = Pass::builder("p").state_bindings(states).build().unwrap();
        let defaults = pass.state_bindings().defaults();
        assert_eq!(defaults.len(), RenderState::ALL.len());
        assert_eq!(
            defaults.get::<f32>(RenderState::Priority.name()),
            Ok(priority::TRANSPARENT)
        );
    }

    #[test]
    fn programs_are_cached_per_signature() {
        let pass = lit_pass();
        let mut context = RecordingContext::new();
        let (renderer, root) = (AggregateStore::new(), AggregateStore::new());
        let vars = EffectVariables::new();

        let material = PropertyStore::new();
        material.set("castShadows", true).unwrap();
        let target = AggregateStore::new();
        target.add_provider(material.clone());
        let resolver = BindingResolver::new(pass.name(), &vars, &target, &renderer, &root);

        let a = pass.select_program(&resolver, &mut context).unwrap();
        let b = pass.select_program(&resolver, &mut context).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(pass.program_count(), 1);

        material.set("castShadows", false).unwrap();
        let c = pass.select_program(&resolver, &mut context).unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(pass.program_count(), 2);
        assert_eq!(context.program_count(), 2);

        pass.clear_programs(&mut context);
        assert_eq!(pass.program_count(), 0);
        assert_eq!(context.program_count(), 0);
    }

    #[test]
    fn compile_failures_are_not_cached() {
        let pass = lit_pass();
        let mut context = RecordingContext::new();
        context.fail_program("lit");
        let stores = [AggregateStore::new(), AggregateStore::new(), AggregateStore::new()];
        let vars = EffectVariables::new();
        let resolver = BindingResolver::new(pass.name(), &vars, &stores[0], &stores[1], &stores[2]);

        let err = pass.select_program(&resolver, &mut context).unwrap_err();
        assert!(matches!(err, DrawError::ProgramCompile { .. }));
        assert_eq!(pass.program_count(), 0);

        context.clear_failures();
        assert!(pass.select_program(&resolver, &mut context).is_ok());
    }
}
