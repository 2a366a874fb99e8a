//! Error handling for failed fragments.
//!
//! The pipeline never interprets a directive's `ErrorPolicy`. It hands the
//! failure and any stale content to an `ErrorHandler`, and
//! `PolicyErrorHandler` is the composition layer's interpretation.

use serde::Serialize;

use crate::fragment::{ErrorPolicy, FragmentDirective, FragmentError};

/// What a failed fragment is replaced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub content: String,
    /// HTTP status the page should carry because of this fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl Substitution {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: None,
        }
    }

    pub fn empty() -> Self {
        Self::content(String::new())
    }
}

/// Decides what a failed fragment renders as.
///
/// Returning `None` leaves the sink to the pipeline, which ends it with
/// empty content.
pub trait ErrorHandler: Send + Sync {
    fn on_error(
        &self,
        directive: &FragmentDirective,
        failure: &FragmentError,
        stale: Option<String>,
    ) -> Option<Substitution>;
}

impl<F> ErrorHandler for F
where
    F: Fn(&FragmentDirective, &FragmentError, Option<String>) -> Option<Substitution> + Send + Sync,
{
    fn on_error(
        &self,
        directive: &FragmentDirective,
        failure: &FragmentError,
        stale: Option<String>,
    ) -> Option<Substitution> {
        self(directive, failure, stale)
    }
}

/// Applies each directive's `ErrorPolicy`. Stale content always wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyErrorHandler;

impl ErrorHandler for PolicyErrorHandler {
    fn on_error(
        &self,
        directive: &FragmentDirective,
        failure: &FragmentError,
        stale: Option<String>,
    ) -> Option<Substitution> {
        if let Some(stale) = stale {
            tracing::info!(
                tracer = %directive.tracer,
                cache_key = %directive.cache_key,
                "Serving stale content after failure"
            );
            return Some(Substitution::content(stale));
        }

        // A missing fragment is a missing page unless the directive ignores it.
        let not_found = (failure.status_code() == Some(404)).then_some(404);
        let substitution = match directive.error_policy {
            ErrorPolicy::IgnoreError => Substitution::empty(),
            ErrorPolicy::Ignore404 if not_found.is_some() => Substitution::empty(),
            ErrorPolicy::Ignore404 | ErrorPolicy::FailQuiet => {
                tracing::warn!(
                    tracer = %directive.tracer,
                    pc_type = %directive.fragment_type,
                    error = %failure,
                    "Fragment failed, rendering nothing"
                );
                Substitution {
                    content: String::new(),
                    status: not_found,
                }
            }
            ErrorPolicy::LeaveOriginal => Substitution {
                content: directive.original_content.clone(),
                status: not_found,
            },
            ErrorPolicy::FailLoud => Substitution {
                content: failure.message().to_string(),
                status: Some(failure.status_code().unwrap_or(500)),
            },
        };
        Some(substitution)
    }
}
