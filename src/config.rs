//! Named configuration sections backed by TOML.
//!
//! Every profile component owns one section. Sections are registered with
//! their default value; a TOML document then overrides whichever sections it
//! names:
//!
//! ```toml
//! [transformation-rules]
//! use-static-qubit-allocation = false
//!
//! [allocation]
//! qubit-limit = 8
//! ```

use std::any::Any;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::QatError;

/// A configuration value that can be read from and written to TOML.
pub trait ConfigSection: Any {
    fn load(&mut self, value: toml::Value) -> Result<(), toml::de::Error>;
    fn dump(&self) -> Result<toml::Value, toml::ser::Error>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C> ConfigSection for C
where
    C: Serialize + DeserializeOwned + Any,
{
    fn load(&mut self, value: toml::Value) -> Result<(), toml::de::Error> {
        *self = value.try_into()?;
        Ok(())
    }

    fn dump(&self) -> Result<toml::Value, toml::ser::Error> {
        toml::Value::try_from(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Configuration sections in registration order.
#[derive(Default)]
pub struct ConfigurationManager {
    sections: Vec<(String, Box<dyn ConfigSection>)>,
}

impl ConfigurationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with the default value of `C`. An existing section of
    /// the same name is kept.
    pub fn add_config<C>(&mut self, name: impl Into<String>)
    where
        C: ConfigSection + Default,
    {
        let name = name.into();
        if self.position(&name).is_none() {
            self.sections.push((name, Box::new(C::default())));
        }
    }

    pub fn get<C: 'static>(&self, name: &str) -> Option<&C> {
        let (_, section) = self.sections.iter().find(|(n, _)| n == name)?;
        section.as_any().downcast_ref()
    }

    pub fn get_mut<C: 'static>(&mut self, name: &str) -> Option<&mut C> {
        let (_, section) = self.sections.iter_mut().find(|(n, _)| n == name)?;
        section.as_any_mut().downcast_mut()
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Override sections from a TOML document. Unknown sections are an error.
    pub fn load_toml(&mut self, text: &str) -> Result<(), QatError> {
        let table: toml::Table = text.parse()?;
        for (name, value) in table {
            let Some(index) = self.position(&name) else {
                return Err(QatError::UnknownSection(name));
            };
            tracing::debug!(section = %name, "loading configuration section");
            self.sections[index].1.load(value)?;
        }
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), QatError> {
        let text = std::fs::read_to_string(path).map_err(|e| QatError::io(path, e))?;
        self.load_toml(&text)
    }

    /// Render every section, including defaults, as a TOML document.
    pub fn to_toml(&self) -> Result<String, QatError> {
        let mut table = toml::Table::new();
        for (name, section) in &self.sections {
            table.insert(name.clone(), section.dump()?);
        }
        Ok(toml::to_string(&table)?)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|(n, _)| n == name)
    }
}
