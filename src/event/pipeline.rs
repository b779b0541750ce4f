//! Outbound event pipeline.
//!
//! [`Client::send_to_server`] turns an [`Event`] into an `event` packet:
//!
//! 1. events already sent (directly or through a derived event) are skipped;
//! 2. extra params are merged onto the event;
//! 3. every field is copied into the packet, widgets and elements becoming
//!    their ids and `null` values being dropped;
//! 4. the event is marked sent;
//! 5. the post-processor registered for the event type may amend the packet;
//! 6. the packet goes to the transport, with any `blob` field split out as a
//!    binary payload.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{json, Map, Value};

use super::message::{Event, EventValue};
use crate::client::Client;
use crate::dom::NodeId;
use crate::error::Result;
use crate::transport::PacketType;

/// Amends an outbound packet for one event type.
pub type PostProcessor = Rc<dyn Fn(&Client, &Event, &mut Map<String, Value>)>;

/// Registered post-processors, keyed by event type.
pub struct EventPipeline {
    post: HashMap<String, PostProcessor>,
}

impl EventPipeline {
    /// A pipeline with the default post-processors installed.
    pub fn new() -> Self {
        let mut pipeline = Self {
            post: HashMap::new(),
        };
        let value: PostProcessor = Rc::new(backfill_value);
        pipeline.post.insert("change".into(), Rc::clone(&value));
        pipeline.post.insert("input".into(), value);
        pipeline.post.insert("resize".into(), Rc::new(attach_bounds));
        pipeline
    }

    /// Install (or replace) the post-processor for `kind`.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        f: impl Fn(&Client, &Event, &mut Map<String, Value>) + 'static,
    ) {
        self.post.insert(kind.into(), Rc::new(f));
    }

    pub fn get(&self, kind: &str) -> Option<PostProcessor> {
        self.post.get(kind).cloned()
    }
}

impl Default for EventPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Value-carrying events report the element's current value when the
/// listener did not supply one.
fn backfill_value(cx: &Client, event: &Event, pkt: &mut Map<String, Value>) {
    if pkt.get("value").is_some_and(|v| !v.is_null()) {
        return;
    }
    let value = event
        .target()
        .and_then(|node| cx.dom().get(node))
        .and_then(|data| data.value.clone());
    if let Some(value) = value {
        pkt.insert("value".into(), Value::String(value));
    }
}

/// Resize events carry the target's new bounding box.
fn attach_bounds(cx: &Client, event: &Event, pkt: &mut Map<String, Value>) {
    let Some(rect) = event.target().and_then(|node| cx.dom().get(node)).map(|d| d.rect) else {
        return;
    };
    pkt.insert("width".into(), json!(rect.width));
    pkt.insert("height".into(), json!(rect.height));
    pkt.insert("top".into(), json!(rect.top));
    pkt.insert("bottom".into(), json!(rect.bottom()));
}

impl Client {
    /// Forward `event` to the server unless it was already sent.
    pub fn send_to_server(&mut self, event: &mut Event, params: Option<Map<String, Value>>) -> Result<()> {
        if event.is_sent() {
            return Ok(());
        }
        if let Some(params) = params {
            event.assign(params);
        }
        let (mut pkt, blob) = self.packet(event);
        event.mark_sent();
        if let Some(post) = self.events.get(event.kind()) {
            post(self, event, &mut pkt);
        }
        self.send_data(PacketType::Event, Value::Object(pkt), blob.as_deref())
    }

    fn packet(&self, event: &Event) -> (Map<String, Value>, Option<Rc<[u8]>>) {
        let mut pkt = Map::new();
        let mut blob = None;
        pkt.insert("type".into(), Value::String(event.kind().to_owned()));
        if let Some(id) = event.target().and_then(|n| self.element_id(n)) {
            pkt.insert("target".into(), Value::String(id));
        }
        if let Some(id) = event.current_target().and_then(|n| self.element_id(n)) {
            pkt.insert("currentTarget".into(), Value::String(id));
        }
        for (name, value) in event.fields() {
            let value = match value {
                EventValue::Json(Value::Null) => continue,
                EventValue::Json(v) => v.clone(),
                EventValue::Widget(key) => match self.widget_id(*key) {
                    Some(id) => Value::String(id),
                    None => continue,
                },
                EventValue::Node(node) => match self.element_id(*node) {
                    Some(id) => Value::String(id),
                    None => continue,
                },
                EventValue::Blob(bytes) => {
                    blob = Some(Rc::clone(bytes));
                    continue;
                }
            };
            pkt.insert(name.to_owned(), value);
        }
        (pkt, blob)
    }

    /// Id of an element, falling back to the id of the widget it belongs to.
    pub(crate) fn element_id(&self, node: NodeId) -> Option<String> {
        let data = self.dom().get(node)?;
        if let Some(id) = &data.id {
            return Some(id.clone());
        }
        let (_, key) = self.dom().closest_widget(node)?;
        self.widget_id(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;
    use crate::geometry::Rect;
    use crate::testing::Pilot;
    use pretty_assertions::assert_eq;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn fields_are_copied_and_nulls_dropped() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let node = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("div").with_id("d1"));
        let mut event = Event::new("click")
            .with_target(node)
            .with_field("button", json!(0))
            .with_field("gone", Value::Null)
            .with_field("where", node)
            .with_field("data", json!({"k": [1, 2]}));
        cx.send_to_server(&mut event, Some(obj(json!({"extra": "x"})))).unwrap();
        let sent = pilot.events();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            json!({
                "type": "click",
                "target": "d1",
                "button": 0,
                "where": "d1",
                "data": {"k": [1, 2]},
                "extra": "x"
            })
        );
    }

    #[test]
    fn sent_marker_blocks_resend() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let mut event = Event::new("click");
        cx.send_to_server(&mut event, None).unwrap();
        let mut derived = event.derive("keycapture");
        cx.send_to_server(&mut derived, None).unwrap();
        cx.send_to_server(&mut event, None).unwrap();
        assert_eq!(pilot.events().len(), 1);
    }

    #[test]
    fn change_backfills_value() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let input = cx
            .dom
            .insert_child(cx.dom.app_root(), NodeData::new("input").with_id("i1").with_value("abc"));
        let mut event = Event::new("change").with_target(input);
        cx.send_to_server(&mut event, None).unwrap();
        let mut explicit = Event::new("input").with_target(input).with_field("value", json!("zz"));
        cx.send_to_server(&mut explicit, None).unwrap();
        let sent = pilot.events();
        assert_eq!(sent[0]["value"], json!("abc"));
        assert_eq!(sent[1]["value"], json!("zz"));
    }

    #[test]
    fn resize_attaches_bounds() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let node = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("div").with_id("r"));
        if let Some(data) = cx.dom.get_mut(node) {
            data.rect = Rect::new(0.0, 10.0, 100.0, 50.0);
        }
        let mut event = Event::new("resize").with_target(node);
        cx.send_to_server(&mut event, None).unwrap();
        let sent = pilot.events();
        assert_eq!(sent[0]["width"], json!(100.0));
        assert_eq!(sent[0]["bottom"], json!(60.0));
    }

    #[test]
    fn custom_post_processor() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        cx.events.register("scroll", |_, _, pkt| {
            pkt.insert("scrolled".into(), json!(true));
        });
        let mut event = Event::new("scroll");
        cx.send_to_server(&mut event, None).unwrap();
        assert_eq!(pilot.events()[0]["scrolled"], json!(true));
    }

    #[test]
    fn blob_becomes_binary_payload() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let mut event = Event::new("upload")
            .with_field("file", json!("a.txt"))
            .with_field("blob", vec![7u8, 8]);
        cx.send_to_server(&mut event, None).unwrap();
        let (packets, blobs) = pilot.outbound_with_blobs();
        assert!(packets[0].data.get("blob").is_none());
        assert_eq!(blobs[0].as_deref(), Some(&[7u8, 8][..]));
    }
}
