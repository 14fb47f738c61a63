#![allow(non_snake_case)]

use std::backtrace::Backtrace;
use std::sync::Arc;

use super::exception::{ErrorCode, ErrorCodeBacktrace};

macro_rules! build_exceptions {
    ($($body:ident($code:expr)),*$(,)*) => {
            impl ErrorCode {
                $(
                pub fn $body(display_text: impl Into<String>) -> ErrorCode {
                    let bt = Some(ErrorCodeBacktrace::Origin(Arc::new(Backtrace::capture())));
                    ErrorCode::create(
                        $code,
                        display_text.into(),
                        None,
                        bt,
                    )
                }
                paste::item! {
                    pub fn [< $body:snake _ code >] ()  -> u16{
                        $code
                    }
                }
                )*
            }
    }
}

// Internal errors [0, 2000].
impl ErrorCode {
    pub const UN_IMPLEMENT_CODE: u16 = 1001;
    pub const TERMINATE_WORKFLOW_CODE: u16 = 1006;
    pub const TRANSIENT_CODE: u16 = 1009;
    pub const LOCK_FAILED_CODE: u16 = 1011;
}
build_exceptions! {
    Ok(0),
    UnImplement(ErrorCode::UN_IMPLEMENT_CODE),
    IllegalArgument(1002),
    NotFound(1003),
    Conflict(1004),
    SendEventFailed(1005),
    TerminateWorkflow(ErrorCode::TERMINATE_WORKFLOW_CODE),
    NonTransient(1007),
    ScriptEvalFailed(1008),
    Transient(ErrorCode::TRANSIENT_CODE),
    PayloadTooLarge(1010),
    LockFailed(ErrorCode::LOCK_FAILED_CODE),
    UnknownException(1999),
}
