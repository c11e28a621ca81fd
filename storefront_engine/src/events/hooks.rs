use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{CheckoutFailedEvent, EventHandler, EventProducer, Handler, OrderPlacedEvent, OtpIssuedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub otp_issued_producer: Vec<EventProducer<OtpIssuedEvent>>,
    pub order_placed_producer: Vec<EventProducer<OrderPlacedEvent>>,
    pub checkout_failed_producer: Vec<EventProducer<CheckoutFailedEvent>>,
}

pub struct EventHandlers {
    pub on_otp_issued: Option<EventHandler<OtpIssuedEvent>>,
    pub on_order_placed: Option<EventHandler<OrderPlacedEvent>>,
    pub on_checkout_failed: Option<EventHandler<CheckoutFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_otp_issued = hooks.on_otp_issued.map(|f| EventHandler::new(buffer_size, f));
        let on_order_placed = hooks.on_order_placed.map(|f| EventHandler::new(buffer_size, f));
        let on_checkout_failed = hooks.on_checkout_failed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_otp_issued, on_order_placed, on_checkout_failed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_otp_issued {
            result.otp_issued_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_placed {
            result.order_placed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_checkout_failed {
            result.checkout_failed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_otp_issued {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_placed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_checkout_failed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_otp_issued: Option<Handler<OtpIssuedEvent>>,
    pub on_order_placed: Option<Handler<OrderPlacedEvent>>,
    pub on_checkout_failed: Option<Handler<CheckoutFailedEvent>>,
}

impl EventHooks {
    pub fn on_otp_issued<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OtpIssuedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_otp_issued = Some(Arc::new(f));
        self
    }

    pub fn on_order_placed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPlacedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_placed = Some(Arc::new(f));
        self
    }

    pub fn on_checkout_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CheckoutFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_checkout_failed = Some(Arc::new(f));
        self
    }
}
