use crate::{
    error::{ClientError, ClientErrorCategory, classify_http_status},
    types::ClientEvent,
};

/// Turn an SDK request failure into a stable client error.
pub fn normalize_sdk_failure(
    operation: &str,
    status: Option<u16>,
    message: impl Into<String>,
) -> ClientError {
    let category = status.map_or(ClientErrorCategory::Network, classify_http_status);
    let code = match category {
        ClientErrorCategory::Auth => "forbidden",
        ClientErrorCategory::RateLimited => "rate_limited",
        ClientErrorCategory::Network => "network_error",
        ClientErrorCategory::Config => "request_rejected",
        ClientErrorCategory::Storage => "storage_error",
        ClientErrorCategory::Serialization => "invalid_response",
        ClientErrorCategory::Internal => "sdk_request_failed",
    };
    ClientError::new(category, code, format!("{operation}: {}", message.into()))
}

fn dialog_title(category: ClientErrorCategory) -> &'static str {
    match category {
        ClientErrorCategory::Config => "Request failed",
        ClientErrorCategory::Auth => "Permission denied",
        ClientErrorCategory::Network => "Server unavailable",
        ClientErrorCategory::RateLimited => "Too many requests",
        ClientErrorCategory::Storage => "Could not save local state",
        ClientErrorCategory::Serialization => "Unexpected data",
        ClientErrorCategory::Internal => "Something went wrong",
    }
}

/// Convert an error into the dialog event shown to the user.
pub fn normalize_error_dialog(error: ClientError) -> ClientEvent {
    ClientEvent::ErrorDialog {
        title: dialog_title(error.category).to_owned(),
        code: error.code,
        message: error.message,
    }
}
