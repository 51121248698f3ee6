//! Browser-backed [`HostBridge`].
//!
//! Browser objects live in a table keyed by [`HostRef`] ids; managed code
//! only ever sees the ids. Every handle is [`AccessMode::Direct`]: calls run
//! on the JS thread and only suspend when the browser hands back a `Promise`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use bridge_traits::{
    error::Result, AccessMode, CallbackRef, HostBridge, HostRef, HostValue,
};
use bytes::Bytes;
use futures::channel::mpsc;
use futures::StreamExt;
use js_sys::{Array, Function, Object, Promise, Reflect, Uint8Array};
use tracing::{debug, trace, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use crate::error::{WasmError, WasmResult};

#[derive(Default)]
struct ObjectTable {
    last_id: Cell<u64>,
    objects: RefCell<HashMap<u64, JsValue>>,
    // Default readers of streams consumed through `read`.
    stream_readers: RefCell<HashMap<u64, JsValue>>,
}

impl ObjectTable {
    fn insert(&self, value: JsValue) -> HostRef {
        let id = self.last_id.get() + 1;
        self.last_id.set(id);
        self.objects.borrow_mut().insert(id, value);
        HostRef::new(id)
    }

    fn get(&self, target: &HostRef) -> WasmResult<JsValue> {
        self.objects
            .borrow()
            .get(&target.id())
            .cloned()
            .ok_or(WasmError::UnknownObject(target.id()))
    }

    fn remove(&self, target: &HostRef) -> Option<JsValue> {
        self.stream_readers.borrow_mut().remove(&target.id());
        self.objects.borrow_mut().remove(&target.id())
    }

    fn len(&self) -> usize {
        self.objects.borrow().len()
    }
}

/// [`HostBridge`] over the browser's File API.
///
/// Clones share one object table.
#[derive(Clone, Default)]
pub struct WasmHost {
    objects: Rc<ObjectTable>,
}

impl WasmHost {
    /// An empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands a browser object to the bridge, e.g. a `File` taken from an
    /// `<input type="file">`. The caller owns the returned reference.
    pub fn adopt(&self, value: JsValue) -> HostRef {
        self.objects.insert(value)
    }

    /// The browser object behind `target`.
    pub fn object(&self, target: &HostRef) -> WasmResult<JsValue> {
        self.objects.get(target)
    }

    /// References currently held in the object table.
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    fn to_js(&self, value: HostValue) -> WasmResult<JsValue> {
        Ok(match value {
            HostValue::Null => JsValue::NULL,
            HostValue::Bool(flag) => JsValue::from_bool(flag),
            HostValue::Number(number) => JsValue::from_f64(number),
            HostValue::String(text) => JsValue::from_str(&text),
            HostValue::Bytes(bytes) => Uint8Array::from(bytes.as_ref()).into(),
            HostValue::Object(target) => self.objects.get(&target)?,
            HostValue::Array(items) => {
                let array = Array::new();
                for item in items {
                    array.push(&self.to_js(item)?);
                }
                array.into()
            }
            HostValue::Record(fields) => {
                let record = Object::new();
                for (key, field) in fields {
                    Reflect::set(&record, &JsValue::from_str(&key), &self.to_js(field)?)?;
                }
                record.into()
            }
            HostValue::Callback(callback) => self.callback_object(callback)?,
        })
    }

    fn from_js(&self, value: JsValue) -> HostValue {
        if value.is_null() || value.is_undefined() {
            HostValue::Null
        } else if let Some(flag) = value.as_bool() {
            HostValue::Bool(flag)
        } else if let Some(number) = value.as_f64() {
            HostValue::Number(number)
        } else if let Some(text) = value.as_string() {
            HostValue::String(text)
        } else if let Some(bytes) = value.dyn_ref::<Uint8Array>() {
            HostValue::Bytes(Bytes::from(bytes.to_vec()))
        } else {
            HostValue::Object(self.objects.insert(value))
        }
    }

    /// Converts call arguments. Trailing nulls are dropped so the browser
    /// sees omitted optional parameters rather than `null`.
    fn arguments(&self, mut args: Vec<HostValue>) -> WasmResult<Array> {
        while matches!(args.last(), Some(HostValue::Null)) {
            args.pop();
        }
        let array = Array::new();
        for arg in args {
            array.push(&self.to_js(arg)?);
        }
        Ok(array)
    }

    /// A `{ invoke(type, event) }` object relaying events to `callback`.
    ///
    /// Events queue in a channel drained by one local task, so each dispatch
    /// finishes before the next starts.
    fn callback_object(&self, callback: CallbackRef) -> WasmResult<JsValue> {
        let (sender, mut receiver) = mpsc::unbounded::<(String, JsValue)>();
        let table = Rc::downgrade(&self.objects);
        let CallbackRef { token, relay } = callback;

        spawn_local(async move {
            while let Some((event_type, event)) = receiver.next().await {
                let Some(objects) = table.upgrade() else {
                    break;
                };
                let event = objects.insert(event);
                drop(objects);
                if let Err(err) = relay.dispatch(token, &event_type, event).await {
                    warn!(%token, event_type = %event_type, error = %err, "Event relay failed");
                }
            }
            debug!(%token, "Event callback released");
        });

        let invoke = Closure::<dyn FnMut(String, JsValue)>::new(
            move |event_type: String, event: JsValue| {
                if sender.unbounded_send((event_type, event)).is_err() {
                    trace!(%token, "Event fired after relay shut down");
                }
            },
        );
        let object = Object::new();
        Reflect::set(&object, &JsValue::from_str("invoke"), &invoke.into_js_value())?;
        Ok(object.into())
    }

    /// Awaits `value` if it is a promise and converts the outcome.
    async fn settle(&self, value: JsValue) -> WasmResult<HostValue> {
        let value = match value.dyn_into::<Promise>() {
            Ok(promise) => JsFuture::from(promise).await?,
            Err(value) => value,
        };
        Ok(self.from_js(value))
    }

    async fn read_stream(&self, target: &HostRef, stream: &JsValue) -> WasmResult<HostValue> {
        let existing = self.objects.stream_readers.borrow().get(&target.id()).cloned();
        let reader = match existing {
            Some(reader) => reader,
            None => {
                let reader = call(stream, "getReader", &Array::new())?;
                self.objects
                    .stream_readers
                    .borrow_mut()
                    .insert(target.id(), reader.clone());
                reader
            }
        };

        let step = call(&reader, "read", &Array::new())?;
        let step = JsFuture::from(Promise::from(step)).await?;
        let done = Reflect::get(&step, &JsValue::from_str("done"))?
            .as_bool()
            .unwrap_or(true);
        if done {
            return Ok(HostValue::Null);
        }
        Ok(self.from_js(Reflect::get(&step, &JsValue::from_str("value"))?))
    }
}

fn call(receiver: &JsValue, method: &str, args: &Array) -> WasmResult<JsValue> {
    let function = Reflect::get(receiver, &JsValue::from_str(method))?
        .dyn_into::<Function>()
        .map_err(|_| WasmError::NotAFunction {
            target: type_name(receiver),
            method: method.to_string(),
        })?;
    Ok(function.apply(receiver, args)?)
}

fn type_name(value: &JsValue) -> String {
    value
        .dyn_ref::<Object>()
        .map(|object| String::from(object.constructor().name()))
        .unwrap_or_else(|| "value".to_string())
}

/// Walks a dotted identifier from `globalThis`, returning the receiver and
/// the function it names.
fn resolve_global(identifier: &str) -> WasmResult<(JsValue, Function)> {
    let mut receiver: JsValue = js_sys::global().into();
    let mut segments = identifier.split('.').peekable();
    while let Some(segment) = segments.next() {
        let value = Reflect::get(&receiver, &JsValue::from_str(segment))?;
        if segments.peek().is_none() {
            let function = value
                .dyn_into::<Function>()
                .map_err(|_| WasmError::NotAFunction {
                    target: "globalThis".to_string(),
                    method: identifier.to_string(),
                })?;
            return Ok((receiver, function));
        }
        receiver = value;
    }
    Err(WasmError::NotAFunction {
        target: "globalThis".to_string(),
        method: identifier.to_string(),
    })
}

fn is_stream(value: &JsValue) -> bool {
    Reflect::has(value, &JsValue::from_str("getReader")).unwrap_or(false)
}

#[async_trait(?Send)]
impl HostBridge for WasmHost {
    fn access_mode(&self) -> AccessMode {
        AccessMode::Direct
    }

    async fn invoke_global(&self, identifier: &str, args: Vec<HostValue>) -> Result<HostValue> {
        let args = self.arguments(args)?;
        let value = if identifier == "import" {
            debug!(count = args.length(), "Importing module");
            // `import` is syntax, not a function, so it needs a shim.
            Function::new_with_args("path", "return import(path)")
                .apply(&JsValue::UNDEFINED, &args)
                .map_err(WasmError::from_thrown)?
        } else {
            let (receiver, function) = resolve_global(identifier)?;
            function
                .apply(&receiver, &args)
                .map_err(WasmError::from_thrown)?
        };
        Ok(self.settle(value).await?)
    }

    async fn invoke(&self, target: &HostRef, method: &str, args: Vec<HostValue>) -> Result<HostValue> {
        let object = self.objects.get(target)?;
        trace!(%target, method, "Invoking browser method");

        if method == "read" && is_stream(&object) {
            return Ok(self.read_stream(target, &object).await?);
        }
        if method == "cancel" {
            let reader = self.objects.stream_readers.borrow().get(&target.id()).cloned();
            if let Some(reader) = reader {
                let pending = call(&reader, "cancel", &Array::new())?;
                return Ok(self.settle(pending).await?);
            }
        }

        let args = self.arguments(args)?;
        let value = call(&object, method, &args)?;
        Ok(self.settle(value).await?)
    }

    async fn release(&self, target: &HostRef) -> Result<()> {
        if self.objects.remove(target).is_some() {
            trace!(%target, "Reference released");
        }
        Ok(())
    }
}

impl fmt::Debug for WasmHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasmHost")
            .field("live_objects", &self.live_objects())
            .finish()
    }
}
