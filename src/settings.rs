//! Configuration store the projector reads its LED current from.

use crate::Result;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Settings key holding the LED drive current (0-255, `<= 0` = leave as is).
pub const PROJECTOR_LED_CURRENT: &str = "ProjectorLEDCurrent";

/// Integer settings lookup.
pub trait ConfigurationStore {
    /// Value for `key`, or 0 when the key is missing or not an integer.
    fn get_int(&self, key: &str) -> i32;
}

impl<C: ConfigurationStore + ?Sized> ConfigurationStore for &C {
    fn get_int(&self, key: &str) -> i32 {
        (**self).get_int(key)
    }
}

/// Key the firmware's settings file nests its values under.
const SETTINGS_WRAPPER: &str = "Settings";

/// Settings kept as a JSON object.
///
/// Values can be changed at runtime with [`set_int`](Self::set_int); the
/// projector reads the current on every LED switch-on, so a change is
/// picked up without restarting.
#[derive(Debug, Default)]
pub struct JsonSettings {
    values: Mutex<Map<String, Value>>,
    /// Top-level keys next to the `"Settings"` object, when the source was
    /// wrapped. `save` writes the same shape back.
    wrapper: Option<Map<String, Value>>,
}

impl JsonSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from JSON text.
    ///
    /// Accepts a flat object or one wrapped in a top-level `"Settings"` key.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut root: Map<String, Value> = serde_json::from_str(json)?;
        let (values, wrapper) = match root.remove(SETTINGS_WRAPPER) {
            Some(Value::Object(inner)) => (inner, Some(root)),
            Some(other) => {
                root.insert(SETTINGS_WRAPPER.to_string(), other);
                (root, None)
            }
            None => (root, None),
        };

        Ok(Self {
            values: Mutex::new(values),
            wrapper,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let settings = Self::from_json(&text)?;
        tracing::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write the settings as pretty JSON, wrapped again if they were loaded
    /// from a wrapped file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let values = self.lock().clone();
        let root = match &self.wrapper {
            Some(outer) => {
                let mut root = outer.clone();
                root.insert(SETTINGS_WRAPPER.to_string(), Value::Object(values));
                root
            }
            None => values,
        };

        fs::write(path, serde_json::to_string_pretty(&root)?)?;
        Ok(())
    }

    pub fn set_int(&self, key: &str, value: i32) {
        self.lock().insert(key.to_string(), Value::from(value));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigurationStore for JsonSettings {
    fn get_int(&self, key: &str) -> i32 {
        self.lock()
            .get(key)
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(0)
    }
}
