//! Services that ship with the node.

use crate::{MicroService, ProcessPayload, ServiceContext, ServiceResult};
use async_trait::async_trait;
use itinerary_types::{ActivityConfig, MessageEnvelope};
use tracing::info;

/// Forwards every message unchanged.
pub struct PassthroughService {
    ctx: ServiceContext,
}

impl PassthroughService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl MicroService for PassthroughService {
    fn init(&mut self, _config: &ActivityConfig) -> ServiceResult<()> {
        Ok(())
    }

    async fn start(&mut self) -> ServiceResult<()> {
        Ok(())
    }

    async fn stop(&mut self) -> ServiceResult<()> {
        Ok(())
    }

    async fn process(&mut self, _payload: ProcessPayload, envelope: &MessageEnvelope) -> ServiceResult<()> {
        self.ctx.submit(envelope.clone())
    }
}

/// Logs each payload, then forwards it.
pub struct LogService {
    ctx: ServiceContext,
    prefix: String,
}

impl LogService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            ctx,
            prefix: String::new(),
        }
    }
}

#[async_trait]
impl MicroService for LogService {
    fn init(&mut self, config: &ActivityConfig) -> ServiceResult<()> {
        if let Some(prefix) = config.static_value("prefix").and_then(|v| v.as_str()) {
            self.prefix = prefix.to_string();
        }
        Ok(())
    }

    async fn start(&mut self) -> ServiceResult<()> {
        Ok(())
    }

    async fn stop(&mut self) -> ServiceResult<()> {
        Ok(())
    }

    async fn process(&mut self, payload: ProcessPayload, envelope: &MessageEnvelope) -> ServiceResult<()> {
        let text = match &payload {
            ProcessPayload::Json(value) => value.to_string(),
            ProcessPayload::Text(text) => text.clone(),
        };
        info!(
            service = %self.ctx.name(),
            interchange_id = %envelope.interchange_id,
            "{}{}",
            self.prefix,
            text
        );
        self.ctx.submit(envelope.clone())
    }
}

/// `statereceiveadapter` that logs every state document it is given.
pub struct StateLoggerService {
    ctx: ServiceContext,
}

impl StateLoggerService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl MicroService for StateLoggerService {
    fn init(&mut self, _config: &ActivityConfig) -> ServiceResult<()> {
        Ok(())
    }

    async fn start(&mut self) -> ServiceResult<()> {
        Ok(())
    }

    async fn stop(&mut self) -> ServiceResult<()> {
        Ok(())
    }

    async fn process(&mut self, payload: ProcessPayload, _envelope: &MessageEnvelope) -> ServiceResult<()> {
        if let ProcessPayload::Json(state) = payload {
            info!(service = %self.ctx.name(), state = %state, "state received");
        }
        Ok(())
    }
}
