// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resolution of declared bindings to concrete value cells.

use trellis_data::{AggregateStore, EffectVariables, Name, ValueCell, format_property_name};

use crate::binding::{Binding, BindingMap, Source};
use crate::error::DrawError;

/// Where a resolved input gets its value from.
#[derive(Clone, Debug)]
pub enum ResolvedSource {
    /// A live property reachable through one of the three aggregates.
    Bound {
        /// Aggregate the path was resolved in.
        store: AggregateStore,
        /// Formatted property path, array suffix included.
        path: String,
    },
    /// The default value store of the binding map.
    Default {
        /// Aggregate and path of the binding that did not resolve, if any.
        /// The value should be re-resolved once that path appears.
        pending: Option<(AggregateStore, String)>,
    },
}

/// The cell an input reads from, and where it came from.
#[derive(Clone, Debug)]
pub struct ResolvedInput {
    /// Shared cell holding the value.
    pub cell: ValueCell,
    /// Origin of the cell.
    pub source: ResolvedSource,
}

/// Splits `"lights[0]"` into `("lights", "[0]")`.
#[must_use]
pub fn split_array_suffix(input: &str) -> (&str, &str) {
    match input.find('[') {
        Some(at) => input.split_at(at),
        None => (input, ""),
    }
}

/// Resolves bindings of one draw unit against its three aggregates.
///
/// ```
/// use trellis_data::{AggregateStore, EffectVariables, Name, PropertyStore};
/// use trellis_draw::{Binding, BindingMap, BindingResolver};
///
/// let material = PropertyStore::new();
/// material.set("material.diffuseColor", [1.0_f32, 0.0, 0.0, 1.0]).unwrap();
/// let target = AggregateStore::new();
/// target.add_provider(material);
/// let (renderer, root) = (AggregateStore::new(), AggregateStore::new());
///
/// let pass = Name::new("forward");
/// let vars = EffectVariables::new();
/// let resolver = BindingResolver::new(&pass, &vars, &target, &renderer, &root);
///
/// let uniforms = BindingMap::new()
///     .with_binding("diffuseColor", Binding::target("material.diffuseColor"));
/// let input = resolver.resolve("diffuseColor", &uniforms).unwrap();
/// assert_eq!(input.cell.get::<[f32; 4]>(), Some([1.0, 0.0, 0.0, 1.0]));
///
/// assert!(resolver.resolve("specularColor", &uniforms).is_err());
/// ```
#[derive(Copy, Clone, Debug)]
pub struct BindingResolver<'a> {
    pass: &'a Name,
    variables: &'a EffectVariables,
    target: &'a AggregateStore,
    renderer: &'a AggregateStore,
    root: &'a AggregateStore,
}

impl<'a> BindingResolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        pass: &'a Name,
        variables: &'a EffectVariables,
        target: &'a AggregateStore,
        renderer: &'a AggregateStore,
        root: &'a AggregateStore,
    ) -> Self {
        Self {
            pass,
            variables,
            target,
            renderer,
            root,
        }
    }

    /// Returns the name of the pass being resolved, for diagnostics.
    #[must_use]
    pub fn pass(&self) -> &'a Name {
        self.pass
    }

    /// Returns the substitution variables.
    #[must_use]
    pub fn variables(&self) -> &'a EffectVariables {
        self.variables
    }

    /// Returns the aggregate behind `source`.
    #[must_use]
    pub fn store(&self, source: Source) -> &'a AggregateStore {
        match source {
            Source::Target => self.target,
            Source::Renderer => self.renderer,
            Source::Root => self.root,
        }
    }

    /// Returns the aggregate and formatted path `binding` points at, with
    /// `suffix` appended verbatim.
    #[must_use]
    pub fn locate(&self, binding: &Binding, suffix: &str) -> (&'a AggregateStore, String) {
        let mut path = format_property_name(self.variables, binding.property_name()).into_owned();
        path.push_str(suffix);
        (self.store(binding.source()), path)
    }

    /// Resolves `input` through `bindings`.
    ///
    /// A trailing `[...]` on the input name is stripped for the binding lookup
    /// and appended verbatim to the resolved path. When the binding is missing
    /// or does not resolve, the default store is consulted under the full
    /// input name, then under the stripped one.
    ///
    /// # Errors
    ///
    /// Returns [`DrawError::MissingValue`] when neither a bound value nor a
    /// default exists.
    pub fn resolve<B: AsRef<Binding>>(
        &self,
        input: &str,
        bindings: &BindingMap<B>,
    ) -> Result<ResolvedInput, DrawError> {
        let (base, suffix) = split_array_suffix(input);
        let located = bindings
            .get(base)
            .map(|binding| self.locate(binding.as_ref(), suffix));

        let bound = located.as_ref().and_then(|(store, path)| {
            store.cell(path).map(|cell| ResolvedInput {
                cell,
                source: ResolvedSource::Bound {
                    store: (*store).clone(),
                    path: path.clone(),
                },
            })
        });
        if let Some(bound) = bound {
            return Ok(bound);
        }

        let defaults = bindings.defaults();
        if let Some(cell) = defaults.cell(input).or_else(|| defaults.cell(base)) {
            return Ok(ResolvedInput {
                cell,
                source: ResolvedSource::Default {
                    pending: located.map(|(store, path)| (store.clone(), path)),
                },
            });
        }

        Err(DrawError::MissingValue {
            pass: self.pass.clone(),
            input: Name::new(input),
            path: located.map_or_else(|| input.to_owned(), |(_, path)| path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_data::PropertyStore;

    struct Fixture {
        pass: Name,
        vars: EffectVariables,
        target: AggregateStore,
        renderer: AggregateStore,
        root: AggregateStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                pass: Name::new("test"),
                vars: EffectVariables::new().with("lightId", "1"),
                target: AggregateStore::new(),
                renderer: AggregateStore::new(),
                root: AggregateStore::new(),
            }
        }

        fn resolver(&self) -> BindingResolver<'_> {
            BindingResolver::new(
                &self.pass,
                &self.vars,
                &self.target,
                &self.renderer,
                &self.root,
            )
        }
    }

    #[test]
    fn array_suffix_split() {
        assert_eq!(split_array_suffix("bones[3]"), ("bones", "[3]"));
        assert_eq!(split_array_suffix("bones"), ("bones", ""));
    }

    #[test]
    fn substitutes_variables_and_picks_source() {
        let f = Fixture::new();
        for diffuse in [1.0_f32, 2.0] {
            let light = PropertyStore::new();
            light.set("diffuse", diffuse).unwrap();
            f.root.add_provider_to(light, "lights");
        }
        let map = BindingMap::new().with_binding("lightColor", Binding::root("lights[${lightId}].diffuse"));
        let input = f.resolver().resolve("lightColor", &map).unwrap();
        assert_eq!(input.cell.get::<f32>(), Some(2.0));
        match input.source {
            ResolvedSource::Bound { store, path } => {
                assert_eq!(store, f.root);
                assert_eq!(path, "lights[1].diffuse");
            }
            ResolvedSource::Default { .. } => panic!("expected a bound value"),
        }
    }

    #[test]
    fn array_inputs_keep_suffix() {
        let f = Fixture::new();
        let skin = PropertyStore::new();
        skin.set("bones[0]", 7_i32).unwrap();
        f.target.add_provider(skin);
        let map = BindingMap::new().with_binding("boneMatrices", Binding::target("bones"));
        let input = f.resolver().resolve("boneMatrices[0]", &map).unwrap();
        assert_eq!(input.cell.get::<i32>(), Some(7));
    }

    #[test]
    fn unresolved_binding_falls_back_to_default() {
        let f = Fixture::new();
        let map = BindingMap::new().with_binding("shininess", Binding::target("material.shininess"));
        map.defaults().set("shininess", 8.0_f32).unwrap();
        let input = f.resolver().resolve("shininess", &map).unwrap();
        assert_eq!(input.cell.get::<f32>(), Some(8.0));
        match input.source {
            ResolvedSource::Default {
                pending: Some((store, path)),
            } => {
                assert_eq!(store, f.target);
                assert_eq!(path, "material.shininess");
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn missing_value_reports_path() {
        let f = Fixture::new();
        let map = BindingMap::new().with_binding("normalMap", Binding::target("material.normalMap"));
        let err = f.resolver().resolve("normalMap", &map).unwrap_err();
        assert_eq!(
            err,
            DrawError::MissingValue {
                pass: Name::new("test"),
                input: Name::new("normalMap"),
                path: "material.normalMap".into(),
            }
        );
        let err = f.resolver().resolve("diffuseColor", &map).unwrap_err();
        assert!(matches!(err, DrawError::MissingValue { path, .. } if path == "diffuseColor"));
    }
}
