use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    AlertRaisedEvent,
    EventHandler,
    EventProducer,
    Handler,
    PayoutConfirmedEvent,
    PayoutOverriddenEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub alert_raised_producer: Vec<EventProducer<AlertRaisedEvent>>,
    pub payout_confirmed_producer: Vec<EventProducer<PayoutConfirmedEvent>>,
    pub payout_overridden_producer: Vec<EventProducer<PayoutOverriddenEvent>>,
}

pub struct EventHandlers {
    pub on_alert_raised: Option<EventHandler<AlertRaisedEvent>>,
    pub on_payout_confirmed: Option<EventHandler<PayoutConfirmedEvent>>,
    pub on_payout_overridden: Option<EventHandler<PayoutOverriddenEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_alert_raised = hooks.on_alert_raised.map(|f| EventHandler::new(buffer_size, f));
        let on_payout_confirmed = hooks.on_payout_confirmed.map(|f| EventHandler::new(buffer_size, f));
        let on_payout_overridden = hooks.on_payout_overridden.map(|f| EventHandler::new(buffer_size, f));
        Self { on_alert_raised, on_payout_confirmed, on_payout_overridden }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_alert_raised {
            result.alert_raised_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_confirmed {
            result.payout_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_overridden {
            result.payout_overridden_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_alert_raised {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payout_confirmed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payout_overridden {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_alert_raised: Option<Handler<AlertRaisedEvent>>,
    pub on_payout_confirmed: Option<Handler<PayoutConfirmedEvent>>,
    pub on_payout_overridden: Option<Handler<PayoutOverriddenEvent>>,
}

impl EventHooks {
    pub fn on_alert_raised<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AlertRaisedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_alert_raised = Some(Arc::new(f));
        self
    }

    pub fn on_payout_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutConfirmedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payout_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_payout_overridden<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutOverriddenEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payout_overridden = Some(Arc::new(f));
        self
    }
}
