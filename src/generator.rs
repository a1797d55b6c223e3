//! Profile assembly from registered components.
//!
//! A component is a named configuration section plus a setup function. When
//! a profile is requested, every component's setup runs in registration order
//! against a [`ProfileBuilder`] that already holds fresh allocation managers,
//! so components registered later see what earlier ones installed.

use qat_rules::{FactoryConfig, RuleSetFactory, RuleTransformationPass, SharedAllocationManager};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigSection, ConfigurationManager};
use crate::error::QatError;
use crate::profile::{Profile, ProfileBuilder, ProfileKind};
use crate::validator::{ProfileValidator, ValidationConfig};

type Setup = Box<dyn Fn(&ConfigurationManager, &mut ProfileBuilder) -> Result<(), QatError>>;

/// Index limits and reuse for the qubit and result managers. Read from the
/// `allocation` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AllocationConfig {
    /// Fixed qubit capacity; unbounded when absent.
    pub qubit_limit: Option<u64>,
    pub result_limit: Option<u64>,
    /// Hand released indices out again. Only meaningful without a limit.
    pub reuse_qubits: bool,
    pub reuse_results: bool,
}

impl AllocationConfig {
    fn manager(limit: Option<u64>, reuse: bool) -> SharedAllocationManager {
        match limit {
            Some(capacity) => SharedAllocationManager::new_static(capacity),
            None => SharedAllocationManager::new_dynamic(reuse),
        }
    }
}

pub struct ProfileGenerator {
    config: ConfigurationManager,
    components: Vec<(String, Setup)>,
}

impl Default for ProfileGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileGenerator {
    /// A generator with no components.
    pub fn new() -> Self {
        Self {
            config: ConfigurationManager::new(),
            components: Vec::new(),
        }
    }

    /// A generator with the built-in components: `allocation`,
    /// `transformation-rules` and `validation`, in that order.
    pub fn with_defaults() -> Self {
        let mut generator = Self::new();
        generator.load_component(register_builtin_components);
        generator
    }

    pub fn config(&self) -> &ConfigurationManager {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigurationManager {
        &mut self.config
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Register a component: its configuration section `name`, initialised to
    /// `C::default()`, and the setup run for every new profile.
    pub fn register_profile_component<C, F>(&mut self, name: impl Into<String>, setup: F)
    where
        C: ConfigSection + Default,
        F: Fn(&C, &mut ProfileBuilder) -> Result<(), QatError> + 'static,
    {
        let name = name.into();
        self.config.add_config::<C>(name.clone());
        let section = name.clone();
        let setup: Setup = Box::new(
            move |config: &ConfigurationManager, builder: &mut ProfileBuilder| {
                let Some(value) = config.get::<C>(&section) else {
                    return Err(QatError::UnknownSection(section.clone()));
                };
                setup(value, builder)
            },
        );
        self.components.push((name, setup));
    }

    /// Hand the generator to a registration callback, the way an external
    /// component library adds itself.
    pub fn load_component(&mut self, register: impl FnOnce(&mut ProfileGenerator)) {
        let before = self.components.len();
        register(self);
        tracing::debug!(added = self.components.len() - before, "components loaded");
    }

    /// Build a profile from the current configuration.
    pub fn new_profile(&self, kind: ProfileKind) -> Result<Profile, QatError> {
        let mut builder = ProfileBuilder::new(kind);
        for (name, setup) in &self.components {
            tracing::debug!(component = %name, profile = %kind, "running profile component");
            setup(&self.config, &mut builder)?;
        }
        Ok(builder.build())
    }
}

fn register_builtin_components(generator: &mut ProfileGenerator) {
    generator.register_profile_component::<AllocationConfig, _>("allocation", |config, builder| {
        let qubits = AllocationConfig::manager(config.qubit_limit, config.reuse_qubits);
        let results = AllocationConfig::manager(config.result_limit, config.reuse_results);
        builder.set_qubit_allocation(qubits);
        builder.set_result_allocation(results);
        Ok(())
    });

    generator.register_profile_component::<FactoryConfig, _>(
        "transformation-rules",
        |config, builder| {
            let config = match builder.kind() {
                ProfileKind::Generic => config.clone(),
                ProfileKind::Base => FactoryConfig {
                    strict: config.strict,
                    ..FactoryConfig::default()
                },
            };
            let factory = RuleSetFactory::new(
                config,
                builder.qubit_allocation().clone(),
                builder.result_allocation().clone(),
            );
            builder.add_pass(RuleTransformationPass::new(factory.build()?));
            Ok(())
        },
    );

    generator.register_profile_component::<ValidationConfig, _>("validation", |config, builder| {
        if builder.kind() == ProfileKind::Base {
            builder.set_validator(ProfileValidator::new(config.clone()));
        }
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use qat_rules::AllocationMode;

    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Marker {
        label: String,
    }

    #[test]
    fn components_run_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut generator = ProfileGenerator::new();
        for name in ["first", "second", "third"] {
            let seen = seen.clone();
            generator.register_profile_component::<Marker, _>(name, move |marker, _| {
                seen.borrow_mut().push(format!("{name}:{}", marker.label));
                Ok(())
            });
        }
        generator
            .config_mut()
            .load_toml("[second]\nlabel = \"configured\"\n")
            .unwrap();

        generator.new_profile(ProfileKind::Generic).unwrap();
        assert_eq!(*seen.borrow(), ["first:", "second:configured", "third:"]);
        assert_eq!(generator.config().section_names(), ["first", "second", "third"]);
    }

    #[test]
    fn setup_errors_abort_profile_creation() {
        let mut generator = ProfileGenerator::new();
        generator.register_profile_component::<Marker, _>("broken", |_, _| {
            Err(QatError::Malformed("broken".to_owned()))
        });
        assert!(matches!(
            generator.new_profile(ProfileKind::Base),
            Err(QatError::Malformed(_))
        ));
    }

    #[test]
    fn builtin_components() {
        let mut generator = ProfileGenerator::with_defaults();
        assert_eq!(
            generator.component_names(),
            ["allocation", "transformation-rules", "validation"]
        );

        let generic = generator.new_profile(ProfileKind::Generic).unwrap();
        assert!(generic.validator().is_none());
        assert_eq!(generic.pipeline().pass_names(), ["rule-transformation"]);
        assert_eq!(generic.qubit_allocation().mode(), AllocationMode::Dynamic { reuse: false });

        generator
            .config_mut()
            .load_toml("[allocation]\nqubit-limit = 4\nreuse-results = true\n")
            .unwrap();
        let base = generator.new_profile(ProfileKind::Base).unwrap();
        assert!(base.validator().is_some());
        assert_eq!(base.qubit_allocation().mode(), AllocationMode::Static { capacity: 4 });
        assert_eq!(base.result_allocation().mode(), AllocationMode::Dynamic { reuse: true });
    }

    #[test]
    fn profiles_get_fresh_managers() {
        let generator = ProfileGenerator::with_defaults();
        let first = generator.new_profile(ProfileKind::Generic).unwrap();
        first.qubit_allocation().allocate().unwrap();

        let second = generator.new_profile(ProfileKind::Generic).unwrap();
        assert_eq!(second.qubit_allocation().count(), 0);
        assert_eq!(first.qubit_allocation().count(), 1);
    }
}
