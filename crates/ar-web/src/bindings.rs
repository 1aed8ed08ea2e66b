// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `ArController`: the JavaScript-facing class.

use std::rc::Rc;

use ar_app_core::ActivationSettings;
use ar_platform_port::{AssetReference, Placement};
use js_sys::Function;
use wasm_bindgen::prelude::*;

use crate::host::{Command, ControllerHost};
use crate::platform::WebPlatform;

fn settings_from(value: JsValue) -> Result<ActivationSettings, JsError> {
    if value.is_undefined() || value.is_null() {
        return Ok(ActivationSettings::default());
    }
    let settings: ActivationSettings =
        serde_wasm_bindgen::from_value(value).map_err(|e| JsError::new(&e.to_string()))?;
    settings
        .validate()
        .map_err(|e| JsError::new(&e.to_string()))?;
    Ok(settings)
}

fn to_js<T: serde::Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

/// AR activation controller bound to the current page.
#[wasm_bindgen]
pub struct ArController {
    host: Rc<ControllerHost<WebPlatform>>,
}

#[wasm_bindgen]
impl ArController {
    /// Create the controller. `settings` is optional; missing fields take
    /// their defaults.
    ///
    /// # Errors
    /// Returns an error if there is no `window`/`document`, or the settings
    /// object is malformed or out of range.
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue) -> Result<Self, JsError> {
        #[cfg(feature = "console-panic")]
        console_error_panic_hook::set_once();
        #[cfg(feature = "console-log")]
        if tracing_wasm::try_set_as_global_default().is_err() {
            web_sys::console::debug_1(&"ArController: tracing subscriber already installed".into());
        }

        let settings = settings_from(settings)?;
        let window = web_sys::window().ok_or_else(|| JsError::new("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsError::new("no document"))?;
        let host = ControllerHost::new(
            move |sink| WebPlatform::new(window, document, sink),
            settings,
        );
        Ok(Self { host })
    }

    /// Handle a tap on the AR button.
    ///
    /// Returns the new attempt id, or `undefined` when the tap was queued
    /// behind a running state callback.
    ///
    /// # Errors
    /// Returns an error if an attempt is already running (under the `reject`
    /// retap policy) or `placement` is neither `floor` nor `wall`.
    #[wasm_bindgen(js_name = startActivation)]
    pub fn start_activation(
        &self,
        model_url: String,
        ios_model_url: Option<String>,
        poster_url: Option<String>,
        placement: Option<String>,
    ) -> Result<Option<u64>, JsError> {
        let placement = match placement.as_deref() {
            None => Placement::default(),
            Some(attr) => Placement::from_attr(attr)
                .ok_or_else(|| JsError::new(&format!("unknown placement: {attr}")))?,
        };
        let mut asset = AssetReference::new(model_url).with_placement(placement);
        if let Some(url) = ios_model_url {
            asset = asset.with_ios_model(url);
        }
        if let Some(url) = poster_url {
            asset = asset.with_poster(url);
        }
        let attempt = self
            .host
            .start(asset)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(attempt.map(|a| a.0))
    }

    /// Abandon the current attempt.
    pub fn cancel(&self) {
        self.host.submit(Command::Cancel);
    }

    /// Dismiss a failure dialog.
    pub fn acknowledge(&self) {
        self.host.submit(Command::Acknowledge);
    }

    /// Continue from the instructions dialog when it is configured to wait.
    #[wasm_bindgen(js_name = confirmStart)]
    pub fn confirm_start(&self) {
        self.host.submit(Command::ConfirmStart);
    }

    /// Register `callback(view)`; it runs at once with the current view.
    #[wasm_bindgen(js_name = onStateChange)]
    pub fn on_state_change(&self, callback: Function) -> u32 {
        self.host.subscribe(move |view| {
            if let Err(err) = callback.call1(&JsValue::NULL, &to_js(view)) {
                web_sys::console::warn_2(&"ArController state listener threw".into(), &err);
            }
        })
    }

    /// Remove a listener registered with `onStateChange`.
    #[wasm_bindgen(js_name = offStateChange)]
    pub fn off_state_change(&self, id: u32) -> bool {
        self.host.unsubscribe(id)
    }

    /// Current `{ state, reason?, recoverable?, dialog }`.
    pub fn state(&self) -> JsValue {
        to_js(&self.host.view())
    }

    /// Current dialog.
    pub fn dialog(&self) -> JsValue {
        to_js(&self.host.view().dialog)
    }

    /// Current `{ is_mobile, is_ios, supports_webxr }`.
    #[wasm_bindgen(js_name = deviceProfile)]
    pub fn device_profile(&self) -> JsValue {
        to_js(&self.host.device_profile())
    }

    /// Tear down any attempt and stop page-lifetime listeners.
    pub fn dispose(&self) {
        self.host.submit(Command::Shutdown);
    }
}
