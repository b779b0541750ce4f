//! File upload widget.
//!
//! Selected files are read without blocking the action drain: each file is
//! queued and a [`Signal::Upload`] is posted; when the application loop
//! handles it, the `upload` event carrying the file's bytes is fired. Files
//! over the `_maxsize` limit, and aborted reads, are reported with a negative
//! `state` instead.
//!
//! The `upload` event goes to the widget that requested the selection (a
//! bound widget that was clicked) and to the upload widget itself.

use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::client::{Client, Signal};
use crate::dom::NodeId;
use crate::error::Result;
use crate::event::{handler, Event};
use crate::widget::{Behavior, Class, Super, WidgetKey};

/// Reading finished.
pub const STATE_DONE: i64 = 2;
/// Reading was aborted.
pub const STATE_ABORTED: i64 = -1;
/// The file exceeds the size limit.
pub const STATE_TOO_LARGE: i64 = -2;

const NAMESPACE: &str = "upload";

/// A file chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug)]
struct PendingFile {
    data: Vec<u8>,
    requestor: Option<WidgetKey>,
}

#[derive(Debug, Default)]
struct UploadState {
    requestor: Option<WidgetKey>,
    pending: IndexMap<String, PendingFile>,
}

struct UploadBehavior;

impl Behavior for UploadBehavior {
    fn init(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.init(cx, key)?;
        let mut state = Map::new();
        state.insert("multiple".into(), json!(false));
        state.insert("accept".into(), Value::Null);
        state.insert("_progress".into(), json!(false));
        state.insert("_maxsize".into(), json!(cx.config().max_upload));
        cx.init_state(key, state, false)
    }

    fn render(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<NodeId> {
        cx.element(key, r#"<input type="file"/>"#)
    }

    fn after_render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.after_render(cx, key)?;
        if let Some(handle) = cx.handle(key) {
            cx.on(handle, &format!("click.{NAMESPACE}"), requestor_handler(key, key));
        }
        Ok(())
    }

    fn destroy(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        cx.node_mut(key)?.take_ext::<UploadState>();
        sup.destroy(cx, key)
    }
}

/// Listener recording `requestor` as the widget the next selection is for.
fn requestor_handler(upload: WidgetKey, requestor: WidgetKey) -> crate::event::Handler {
    handler(move |cx, _| {
        if let Some(node) = cx.registry.get_mut(upload) {
            node.ext_mut::<UploadState>().requestor = Some(requestor);
        }
        Ok(())
    })
}

pub fn upload_class(ui: &Rc<Class>) -> Rc<Class> {
    ui.extend("Upload")
        .behavior(UploadBehavior)
        .setter("accept", |cx, key, v, _| {
            cx.set_handle_attr(key, "accept", v);
            Ok(())
        })
        .setter("multiple", |cx, key, v, _| {
            cx.set_handle_attr(key, "multiple", v);
            Ok(())
        })
        .method("abort", |cx, key, args| {
            cx.abort_upload(key, &args.str(0)?)?;
            Ok(Value::Null)
        })
        .method("abortAll", |cx, key, _| {
            cx.abort_all_uploads(key)?;
            Ok(Value::Null)
        })
        .method("bind", |cx, key, args| {
            cx.bind_upload(key, args.widget(0)?);
            Ok(Value::Null)
        })
        .method("unbind", |cx, _, args| {
            cx.unbind_upload(args.widget(0)?);
            Ok(Value::Null)
        })
        .method("clear", |cx, key, _| {
            cx.abort_all_uploads(key)?;
            cx.rerender(key)?;
            Ok(Value::Null)
        })
        .build()
}

impl Client {
    /// Hand the user's file selection to an upload widget.
    pub fn select_files(&mut self, key: WidgetKey, files: Vec<SelectedFile>) -> Result<()> {
        let max = self
            .get_state(key, "_maxsize")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.config().max_upload);
        let id = self.node(key)?.id().to_owned();
        let requestor = self.node_mut(key)?.ext_mut::<UploadState>().requestor.take();
        for file in files {
            let total = file.data.len() as u64;
            if total > max {
                tracing::debug!(upload = %id, file = %file.name, total, max, "file exceeds upload limit");
                self.fire_upload(key, requestor, &file.name, None, STATE_TOO_LARGE, total)?;
                continue;
            }
            let pending = PendingFile {
                data: file.data,
                requestor,
            };
            self.node_mut(key)?
                .ext_mut::<UploadState>()
                .pending
                .insert(file.name.clone(), pending);
            self.post(Signal::Upload {
                id: id.clone(),
                file: file.name,
            });
        }
        Ok(())
    }

    /// Cancel reading `file`. Returns whether it was still pending.
    pub fn abort_upload(&mut self, key: WidgetKey, file: &str) -> Result<bool> {
        let pending = self.node_mut(key)?.ext_mut::<UploadState>().pending.shift_remove(file);
        match pending {
            Some(pending) => {
                let total = pending.data.len() as u64;
                self.fire_upload(key, pending.requestor, file, None, STATE_ABORTED, total)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn abort_all_uploads(&mut self, key: WidgetKey) -> Result<()> {
        let names: Vec<String> = self
            .node_mut(key)?
            .ext_mut::<UploadState>()
            .pending
            .keys()
            .cloned()
            .collect();
        for name in names {
            self.abort_upload(key, &name)?;
        }
        Ok(())
    }

    /// Names of the files still being read.
    pub fn pending_uploads(&self, key: WidgetKey) -> Vec<String> {
        self.registry
            .get(key)
            .and_then(|n| n.ext::<UploadState>())
            .map(|s| s.pending.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Make clicks on `widget` request a selection for `upload`.
    pub fn bind_upload(&mut self, upload: WidgetKey, widget: WidgetKey) {
        self.unbind_upload(widget);
        if let Some(handle) = self.handle(widget) {
            self.on(handle, &format!("click.{NAMESPACE}"), requestor_handler(upload, widget));
        }
    }

    pub fn unbind_upload(&mut self, widget: WidgetKey) {
        if let Some(handle) = self.handle(widget) {
            self.off(handle, &format!("click.{NAMESPACE}"));
        }
    }

    fn fire_upload(
        &mut self,
        key: WidgetKey,
        requestor: Option<WidgetKey>,
        file: &str,
        blob: Option<Vec<u8>>,
        loaded: i64,
        total: u64,
    ) -> Result<()> {
        let state = if loaded < 0 { loaded } else { STATE_DONE };
        let event = || {
            let event = Event::new("upload").with_field("file", json!(file));
            let event = match &blob {
                Some(bytes) => event.with_field("blob", bytes.clone()),
                None => event.with_field("blob", Value::Null),
            };
            event
                .with_field("state", json!(state))
                .with_field("loaded", json!(loaded.max(0)))
                .with_field("total", json!(total))
        };
        if let Some(requestor) = requestor.filter(|r| self.registry.contains(*r)) {
            self.trigger(requestor, event())?;
        }
        if requestor != Some(key) {
            self.trigger(key, event())?;
        }
        Ok(())
    }
}

/// Finish reading `file` for the upload widget `id`.
pub fn complete(cx: &mut Client, id: &str, file: &str) -> Result<()> {
    let Some(key) = cx.find(id) else {
        return Ok(());
    };
    let Some(pending) = cx.node_mut(key)?.ext_mut::<UploadState>().pending.shift_remove(file) else {
        return Ok(());
    };
    let size = pending.data.len() as u64;
    let loaded = i64::try_from(size).unwrap_or(i64::MAX);
    cx.fire_upload(key, pending.requestor, file, Some(pending.data), loaded, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::testing::Pilot;
    use pretty_assertions::assert_eq;

    async fn upload(pilot: &mut Pilot) -> WidgetKey {
        let key = pilot.create("Upload", "u1", json!({"accept": ".txt"})).await;
        pilot.send(json!({"tgt": "u1", "fcn": "forwardToServer", "arg": "upload"})).await;
        key
    }

    #[tokio::test]
    async fn oversize_file_is_rejected_without_reading() {
        let mut pilot = Pilot::with_config(ClientConfig::new("test").with_max_upload(4));
        let key = upload(&mut pilot).await;
        pilot
            .client_mut()
            .select_files(key, vec![SelectedFile::new("big.bin", vec![0u8; 10])])
            .unwrap();
        assert!(pilot.client().pending_uploads(key).is_empty());
        let (packets, blobs) = pilot.outbound_with_blobs();
        assert_eq!(packets.len(), 1);
        let data = &packets[0].data;
        assert_eq!(data["type"], json!("upload"));
        assert_eq!(data["target"], json!("u1"));
        assert_eq!(data["file"], json!("big.bin"));
        assert_eq!(data["state"], json!(-2));
        assert_eq!(data["loaded"], json!(0));
        assert_eq!(data["total"], json!(10));
        assert!(data.get("blob").is_none());
        assert_eq!(blobs[0], None);
    }

    #[tokio::test]
    async fn completed_read_carries_blob() {
        let mut pilot = Pilot::new();
        let key = upload(&mut pilot).await;
        pilot
            .client_mut()
            .select_files(key, vec![SelectedFile::new("a.txt", b"hello".to_vec())])
            .unwrap();
        assert_eq!(pilot.client().pending_uploads(key), vec!["a.txt".to_owned()]);
        assert!(pilot.events_of("upload").is_empty());

        pilot.pump().await;
        let (packets, blobs) = pilot.outbound_with_blobs();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data["state"], json!(2));
        assert_eq!(packets[0].data["loaded"], json!(5));
        assert_eq!(packets[0].data["total"], json!(5));
        assert_eq!(blobs[0].as_deref(), Some(&b"hello"[..]));
        assert!(pilot.client().pending_uploads(key).is_empty());
    }

    #[tokio::test]
    async fn abort_reports_and_cancels() {
        let mut pilot = Pilot::new();
        let key = upload(&mut pilot).await;
        let files = vec![SelectedFile::new("a.txt", b"a".to_vec()), SelectedFile::new("b.txt", b"bb".to_vec())];
        pilot.client_mut().select_files(key, files).unwrap();
        pilot.send(json!({"tgt": "u1", "fcn": "abort", "arg": "a.txt"})).await;
        pilot.pump().await;
        let events = pilot.events_of("upload");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["file"], json!("a.txt"));
        assert_eq!(events[0]["state"], json!(-1));
        assert_eq!(events[1]["file"], json!("b.txt"));
        assert_eq!(events[1]["state"], json!(2));
    }

    #[tokio::test]
    async fn bound_widget_receives_upload_too() {
        let mut pilot = Pilot::new();
        let key = upload(&mut pilot).await;
        pilot.create("Button", "b1", json!({"label": "Attach"})).await;
        pilot.send(json!({"tgt": "b1", "fcn": "forwardToServer", "arg": "upload"})).await;
        pilot.send(json!({"tgt": "u1", "fcn": "bind", "arg": [{"__widget__": "b1"}]})).await;

        pilot.fire("b1", Event::new("click"));
        pilot
            .client_mut()
            .select_files(key, vec![SelectedFile::new("a.txt", b"x".to_vec())])
            .unwrap();
        pilot.pump().await;
        let targets: Vec<Value> = pilot.events_of("upload").into_iter().map(|e| e["target"].clone()).collect();
        assert_eq!(targets, vec![json!("b1"), json!("u1")]);

        pilot.send(json!({"tgt": "u1", "fcn": "unbind", "arg": [{"__widget__": "b1"}]})).await;
        pilot.fire("b1", Event::new("click"));
        pilot
            .client_mut()
            .select_files(key, vec![SelectedFile::new("b.txt", b"y".to_vec())])
            .unwrap();
        pilot.pump().await;
        assert_eq!(pilot.events_of("upload").len(), 3);
    }

    #[tokio::test]
    async fn attributes_and_clear() {
        let mut pilot = Pilot::new();
        let key = upload(&mut pilot).await;
        pilot.send(json!({"tgt": "u1", "fcn": "updateState", "arg": ["multiple", true, true]})).await;
        assert_eq!(
            pilot.html_of("u1"),
            r#"<input id="u1" class="sw_upload" accept=".txt" multiple="multiple" type="file">"#
        );
        pilot
            .client_mut()
            .select_files(key, vec![SelectedFile::new("a.txt", b"x".to_vec())])
            .unwrap();
        let before = pilot.node("u1");
        pilot.send(json!({"tgt": "u1", "fcn": "clear"})).await;
        assert_ne!(pilot.node("u1"), before);
        pilot.pump().await;
        let states: Vec<Value> = pilot.events_of("upload").into_iter().map(|e| e["state"].clone()).collect();
        assert_eq!(states, vec![json!(-1)]);
    }
}
