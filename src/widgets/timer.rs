//! Timer widget: periodic `timer` events.
//!
//! While running, a task posts [`Signal::Tick`] every `interval`
//! milliseconds and the application loop calls [`tick`]. With `repeat` at
//! `n >= 0` the timer stops itself after `n + 1` ticks; a negative `repeat`
//! runs until stopped. The task is aborted on detach and destroy.

use std::rc::Rc;
use std::time::Duration;

use serde_json::json;
use tokio::task::AbortHandle;

use super::TagRenderer;
use crate::client::{Client, Signal};
use crate::error::Result;
use crate::event::Event;
use crate::util;
use crate::widget::{Behavior, Class, Super, WidgetKey};

#[derive(Debug)]
struct TimerState {
    interval: u64,
    repeat: i64,
    count: u64,
    task: Option<AbortHandle>,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            interval: 0,
            repeat: -1,
            count: 0,
            task: None,
        }
    }
}

struct TimerBehavior;

impl Behavior for TimerBehavior {
    fn render(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<crate::dom::NodeId> {
        TagRenderer("span").render(cx, key, _sup)
    }

    fn detach(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        cx.stop_timer(key);
        sup.detach(cx, key)
    }

    fn destroy(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        cx.stop_timer(key);
        sup.destroy(cx, key)
    }
}

pub fn timer_class(base: &Rc<Class>) -> Rc<Class> {
    base.extend("Timer")
        .behavior(TimerBehavior)
        .setter("interval", |cx, key, v, _| {
            let interval = v.as_f64().map_or(0, |ms| ms.max(0.0) as u64);
            cx.node_mut(key)?.ext_mut::<TimerState>().interval = interval;
            let running = cx.get_state(key, "running").is_some_and(|r| util::truthy(&r));
            if cx.stop_timer(key) || running {
                cx.start_timer(key);
            }
            Ok(())
        })
        .setter("repeat", |cx, key, v, _| {
            cx.node_mut(key)?.ext_mut::<TimerState>().repeat = v.as_i64().unwrap_or(-1);
            Ok(())
        })
        .setter("running", |cx, key, v, _| {
            if util::truthy(v) {
                cx.start_timer(key);
            } else {
                cx.stop_timer(key);
            }
            Ok(())
        })
        .build()
}

impl Client {
    /// Start ticking. Returns whether the timer is running afterwards.
    pub fn start_timer(&mut self, key: WidgetKey) -> bool {
        let tx = self.signals().clone();
        let Some(node) = self.registry.get_mut(key) else {
            return false;
        };
        let id = node.id().to_owned();
        let timer = node.ext_mut::<TimerState>();
        if timer.task.is_some() {
            return true;
        }
        if timer.interval == 0 {
            return false;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!(timer = %id, "no async runtime; timer not started");
            return false;
        }
        let period = Duration::from_millis(timer.interval);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(Signal::Tick(id.clone())).is_err() {
                    break;
                }
            }
        });
        timer.count = 0;
        timer.task = Some(task.abort_handle());
        true
    }

    /// Stop ticking. Returns whether the timer was running.
    pub fn stop_timer(&mut self, key: WidgetKey) -> bool {
        let task = self
            .registry
            .get_mut(key)
            .and_then(|n| n.ext_mut::<TimerState>().task.take());
        match task {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_timer_running(&self, key: WidgetKey) -> bool {
        self.registry
            .get(key)
            .and_then(|n| n.ext::<TimerState>())
            .is_some_and(|t| t.task.is_some())
    }
}

/// Handle one elapsed interval of the timer with id `id`.
pub fn tick(cx: &mut Client, id: &str) -> Result<()> {
    let Some(key) = cx.find(id) else {
        return Ok(());
    };
    if !cx.is_connected() {
        cx.stop_timer(key);
        return Ok(());
    }
    let timer = cx.node_mut(key)?.ext_mut::<TimerState>();
    if timer.task.is_none() {
        return Ok(());
    }
    timer.count += 1;
    let count = timer.count;
    let expired = i64::try_from(count).map_or(true, |c| timer.repeat >= 0 && c > timer.repeat);
    if expired {
        cx.update_state(key, "running", json!(false), false)?;
    }
    let running = cx.is_timer_running(key);
    let event = Event::new("timer")
        .with_field("count", json!(count))
        .with_field("running", json!(running));
    cx.trigger(key, event)?;
    Ok(())
}
