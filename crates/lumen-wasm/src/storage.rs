//! `localStorage` backed key-value store

use lumen_core::{Error, KeyValueStore, Result};
use wasm_bindgen::{JsCast, JsValue};

/// Readable message from a thrown JS value
pub(crate) fn js_message(err: &JsValue) -> String {
    if let Some(message) = err.as_string() {
        message
    } else if let Some(js_err) = err.dyn_ref::<js_sys::Error>() {
        js_err.message().into()
    } else {
        format!("{err:?}")
    }
}

fn js_error(context: &str, err: JsValue) -> Error {
    Error::Storage(format!("localStorage {context}: {}", js_message(&err)))
}

/// Browser `localStorage`
#[derive(Clone)]
pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

impl LocalStorageStore {
    pub fn open() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| Error::Storage("no window".into()))?;
        let storage = window
            .local_storage()
            .map_err(|err| js_error("open", err))?
            .ok_or_else(|| Error::Storage("localStorage disabled".into()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Option<String> {
        // Reads can throw in some private modes; treat as absent
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|err| js_error("set", err))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.storage
            .remove_item(key)
            .map_err(|err| js_error("remove", err))
    }
}
