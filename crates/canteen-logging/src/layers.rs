//! Custom tracing layers
//!
//! [`OriginContextLayer`] attaches the active origin to every new span so
//! downstream layers and formatters can read it back.

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{OriginContextData, OriginContextGuard};

/// Layer that injects origin context into spans
///
/// When an [`OriginContextGuard`] is active, new spans get an
/// [`OriginContextExtension`] holding its data.
#[derive(Debug, Default)]
pub struct OriginContextLayer;

impl OriginContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct OriginContextExtension {
    pub data: OriginContextData,
}

impl<S> Layer<S> for OriginContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        if let Some(origin) = OriginContextGuard::current() {
            span.extensions_mut()
                .insert(OriginContextExtension { data: origin });
        }
    }
}
