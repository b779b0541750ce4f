//! Integration tests for statewire.
//!
//! These tests drive a client from outside the crate, playing the server's
//! part through the testing pilot and the application loop.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use statewire::action::{decode_args, encode_args, sync_function};
use statewire::registry::{MemoryLoader, Module};
use statewire::testing::{document_to_string, pretty_html, widget_tree, Pilot};
use statewire::transport::PacketType;
use statewire::widget::{base_class, Props};
use statewire::widgets::upload::SelectedFile;
use statewire::widgets::TagRenderer;
use statewire::{App, ClientConfig};

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_button_renders_label() {
    let mut pilot = Pilot::new();
    pilot
        .send(json!({"fcn": "widget.create", "arg": [null, {"wclass": "Button", "id": "btn1"}, {"label": "Go"}]}))
        .await;
    assert!(pilot.fatal_messages().is_empty());
    let dom = pilot.client().dom();
    let button = dom.query_by_id("btn1").unwrap();
    assert_eq!(dom.get(button).unwrap().tag, "button");
    insta::assert_snapshot!(pretty_html(dom, button), @r#"
    <button id="btn1" class="sw_button btn">
      <span id="btn1-lbl">Go</span>
    </button>
    "#);
}

#[tokio::test]
async fn test_update_state_changes_text_and_reports_once() {
    let mut pilot = Pilot::new();
    pilot.create("Button", "btn1", json!({"label": "Go"})).await;
    pilot
        .send(json!({"tgt": "btn1", "fcn": "updateState", "arg": ["label", "Stop"]}))
        .await;
    assert_eq!(pilot.text("btn1"), "Stop");
    let changes = pilot.events_of("statechange");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["state"], json!("label"));
    assert_eq!(changes[0]["value"], json!("Stop"));
}

#[tokio::test]
async fn test_oversize_upload_reports_negative_state() {
    let mut pilot = Pilot::with_config(ClientConfig::new("test").with_max_upload(1024));
    let key = pilot.create("Upload", "u1", json!({})).await;
    pilot.send(json!({"tgt": "u1", "fcn": "forwardToServer", "arg": "upload"})).await;
    let big = SelectedFile::new("movie.mp4", vec![7u8; 2048]);
    assert!(pilot.client_mut().select_files(key, vec![big]).is_ok());
    pilot.pump().await;

    let (packets, blobs) = pilot.outbound_with_blobs();
    let uploads: Vec<usize> = packets
        .iter()
        .enumerate()
        .filter(|(_, p)| p.kind == PacketType::Event && p.data["type"] == json!("upload"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(uploads.len(), 1);
    let data = &packets[uploads[0]].data;
    assert_eq!(data["state"], json!(-2));
    assert!(data.get("blob").is_none());
    assert_eq!(blobs[uploads[0]], None);
    assert!(pilot.fatal_messages().is_empty());
}

#[tokio::test]
async fn test_unknown_target_halts_batch() {
    let mut pilot = Pilot::new();
    pilot.create("Span", "s1", json!({"content": "before"})).await;
    pilot
        .send(json!([
            {"tgt": "s1", "fcn": "updateState", "arg": ["content", "first"]},
            {"tgt": "missing", "fcn": "updateState", "arg": ["content", "x"]},
            {"tgt": "s1", "fcn": "updateState", "arg": ["content", "never"]}
        ]))
        .await;
    assert_eq!(pilot.text("s1"), "first");
    let messages = pilot.fatal_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("missing"));

    // The next message starts a fresh batch.
    pilot
        .send(json!({"tgt": "s1", "fcn": "updateState", "arg": ["content", "after"]}))
        .await;
    assert_eq!(pilot.text("s1"), "after");
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_module_load_delays_later_actions() {
    let seen: Rc<RefCell<Vec<Value>>> = Rc::default();
    let record = Rc::clone(&seen);
    let module = Module::new("reports").with_function(
        "snapshot",
        sync_function(move |cx, _| {
            let key = cx.find("s1");
            let content = key.and_then(|k| cx.get_state(k, "content"));
            record.borrow_mut().push(content.unwrap_or(Value::Null));
            Ok(Value::Null)
        }),
    );
    let loader = MemoryLoader::with_builtins()
        .with_module(module)
        .with_delay(Duration::from_millis(10));
    let mut pilot = Pilot::with_loader(loader);
    pilot.create("Span", "s1", json!({"content": "old"})).await;

    pilot
        .send(json!([
            {"tgt": "@reports", "fcn": "snapshot"},
            {"tgt": "s1", "fcn": "updateState", "arg": ["content", "new"]}
        ]))
        .await;
    assert_eq!(*seen.borrow(), vec![json!("old")]);
    assert_eq!(pilot.text("s1"), "new");
}

#[tokio::test]
async fn test_app_applies_messages_in_arrival_order() {
    let loader = Rc::new(MemoryLoader::with_builtins().with_delay(Duration::from_millis(5)));
    let (mut app, mut server) = App::channel(ClientConfig::new("p1"), loader);
    server.push(
        json!({"fcn": "widget.create", "arg": [null, {"wclass": "Page", "id": "pg", "cntr": true}, {}]})
            .to_string(),
    );
    server.push(
        json!([
            {"fcn": "widget.create", "arg": [{"__widget__": "pg"}, {"wclass": "Div", "id": "d1", "cntr": true}, {}]},
            {"fcn": "widget.create", "arg": [{"__widget__": "d1"}, {"wclass": "Span", "id": "s1"}, {"content": "a"}]},
            {"fcn": "widget.create", "arg": [{"__widget__": "d1"}, {"wclass": "Span", "id": "s2"}, {"content": "b"}]}
        ])
        .to_string(),
    );
    server.push(json!({"tgt": "d1", "fcn": "swapChildren", "arg": [0, 1]}).to_string());
    server.close_inbound();
    app.run().await.unwrap();

    insta::assert_snapshot!(document_to_string(app.client()), @r#"
    <div id="sw_root">
      <div id="pg">
        <div id="d1" class="sw_div">
          <span id="s2" class="sw_span">
            <span id="s2-content">b</span>
          </span>
          <span id="s1" class="sw_span">
            <span id="s1-content">a</span>
          </span>
        </div>
      </div>
    </div>
    "#);
    let first = server.drain().into_iter().next().unwrap().decode().unwrap().0;
    assert_eq!(first.kind, PacketType::Init);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_destroying_container_unregisters_every_descendant() {
    let mut pilot = Pilot::new();
    let root = pilot
        .create_with(Props::new("Div").with_id("root").container(), None, json!({}))
        .await;
    let mid = pilot
        .create_with(Props::new("Div").with_id("mid").container(), Some(root), json!({}))
        .await;
    for id in ["a", "b"] {
        pilot
            .create_with(Props::new("Span").with_id(id), Some(mid), json!({"content": id}))
            .await;
    }
    insta::assert_snapshot!(widget_tree(pilot.client()), @r#"
    Div#root
      Div#mid
        Span#a
        Span#b
    "#);

    pilot.send(json!({"tgt": "root", "fcn": "destroy"})).await;
    let cx = pilot.client();
    assert!(cx.registry().is_empty());
    for id in ["root", "mid", "a", "b"] {
        assert!(cx.find(id).is_none(), "{id} still registered");
        assert!(cx.dom().query_by_id(id).is_none(), "{id} still in the document");
    }
}

#[tokio::test]
async fn test_rerender_preserves_children_and_state() {
    let mut pilot = Pilot::new();
    let div = pilot
        .create_with(Props::new("Div").with_id("d1").container(), None, json!({"hint": "tip"}))
        .await;
    let s1 = pilot
        .create_with(Props::new("Span").with_id("s1"), Some(div), json!({"content": "x"}))
        .await;
    let before = pilot.html_of("d1");
    pilot.send(json!({"tgt": "d1", "fcn": "rerender"})).await;
    assert_eq!(pilot.html_of("d1"), before);
    let cx = pilot.client();
    assert_eq!(cx.children_of(div), vec![s1]);
    assert_eq!(cx.find("s1"), Some(s1));
    assert!(pilot.fatal_messages().is_empty());
}

#[tokio::test]
async fn test_super_chain_resolves_each_level() {
    let mut pilot = Pilot::new();
    let calls: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let (a, b, c) = (Rc::clone(&calls), Rc::clone(&calls), Rc::clone(&calls));
    let first = base_class()
        .extend("First")
        .behavior(TagRenderer("div"))
        .method("describe", move |_, _, _| {
            a.borrow_mut().push("First");
            Ok(json!(["First"]))
        })
        .build();
    let second = first
        .extend("Second")
        .method_with_super("describe", move |sup, cx, key, args| {
            b.borrow_mut().push("Second");
            let mut names = sup(cx, key, args)?;
            if let Value::Array(list) = &mut names {
                list.push(json!("Second"));
            }
            Ok(names)
        })
        .build();
    let third = second
        .extend("Third")
        .method_with_super("describe", move |sup, cx, key, args| {
            c.borrow_mut().push("Third");
            let mut names = sup(cx, key, args)?;
            if let Value::Array(list) = &mut names {
                list.push(json!("Third"));
            }
            Ok(names)
        })
        .build();
    let cx = pilot.client_mut();
    cx.addon("chain", third);
    let key = cx
        .create_now(None, Props::new("Third").with_module("chain").with_id("t1"), None)
        .unwrap();
    let result = cx
        .invoke(key, "describe", statewire::widget::Args::default())
        .unwrap();
    assert_eq!(result, json!(["First", "Second", "Third"]));
    assert_eq!(*calls.borrow(), vec!["Third", "Second", "First"]);
}

#[test]
fn test_argument_replay_is_idempotent() {
    let mut pilot = Pilot::new();
    let key = tokio_test::block_on(pilot.create("Div", "w1", json!({})));
    let registry = pilot.client().registry();
    let wire = json!([{"__widget__": "w1"}, null, 42]);
    let args = decode_args("f", &wire, registry);
    assert_eq!(args.opt_widget(0), Some(key));
    assert_eq!(args.value(1), Value::Null);

    let encoded = encode_args(&args, registry);
    assert_eq!(encoded, wire);
    let replayed = decode_args("f", &encoded, registry);
    assert_eq!(replayed, args);
    assert_eq!(replayed.len(), 3);
}
