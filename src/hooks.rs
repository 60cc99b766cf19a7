//! Interceptors around client operations.
//!
//! Instead of a wrapper re-implementing the whole client interface, logging
//! and other cross-cutting observation compose as an ordered list of hooks
//! invoked before and after each core operation.

use std::sync::Arc;

use crate::log::{LogBuffer, LogLevel};
use crate::result::FetchError;

/// Operation a hook is observing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOp {
    Query,
    Invalidate,
}

/// Call-site context handed to hooks.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub key: &'a str,
    pub op: HookOp,
}

/// Observer invoked around the client's core operations.
///
/// Hooks run in registration order, `before` ahead of the operation and
/// `after` once it settles. Both default to no-ops, so implementations
/// override only the side they care about.
pub trait QueryHook: Send + Sync {
    fn before(&self, _ctx: &HookContext<'_>) {}

    fn after(&self, _ctx: &HookContext<'_>, _error: Option<&FetchError>) {}
}

/// Shipped hook that records operations into a shared [`LogBuffer`].
pub struct LoggingHook {
    buffer: Arc<LogBuffer>,
}

impl LoggingHook {
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self { buffer }
    }

    /// The buffer this hook records into.
    pub fn buffer(&self) -> &Arc<LogBuffer> {
        &self.buffer
    }
}

impl QueryHook for LoggingHook {
    fn before(&self, ctx: &HookContext<'_>) {
        let message = match ctx.op {
            HookOp::Query => format!("query started for `{}`", ctx.key),
            HookOp::Invalidate => format!("invalidating `{}`", ctx.key),
        };
        self.buffer.record(LogLevel::Info, message);
    }

    fn after(&self, ctx: &HookContext<'_>, error: Option<&FetchError>) {
        match (ctx.op, error) {
            (HookOp::Query, Some(err)) => self
                .buffer
                .record(LogLevel::Error, format!("query for `{}` failed: {err}", ctx.key)),
            (HookOp::Query, None) => self
                .buffer
                .record(LogLevel::Info, format!("query for `{}` settled", ctx.key)),
            (HookOp::Invalidate, _) => self
                .buffer
                .record(LogLevel::Info, format!("invalidated `{}`", ctx.key)),
        }
    }
}
