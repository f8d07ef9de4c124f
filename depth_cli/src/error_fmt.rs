//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use depth_core::{BuildError, DepthError};

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingConfig => {
                "What happened: No configuration was supplied to the fusion context.\nLikely causes: The --config file failed to load.\nHow to fix: Point --config at a valid configuration TOML.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DepthError>() {
        return match de {
            DepthError::MissingConfig => {
                "What happened: No configuration was supplied.\nHow to fix: Point --config at a valid configuration TOML.".to_string()
            }
            DepthError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nHow to fix: Edit the config file, then rerun."
            ),
            DepthError::CalibrationFit(msg) => format!(
                "What happened: The continuous calibrator could not fit a model ({msg}).\nLikely causes: Too few or too noisy neural/reference sample pairs so far.\nHow to fix: This is expected during warm-up; it resolves once enough agreeing samples accumulate."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("parsing frame record") {
        return format!(
            "What happened: A replay input line was not valid JSON for a frame record.\nHow to fix: Check the input file's JSON-lines formatting.\nOriginal: {msg}"
        );
    }

    if lower.contains("parsing config file") || lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid or malformed TOML.\nHow to fix: Edit the config file and try again.\nOriginal: {msg}"
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!("Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}")
}

/// Non-zero exit codes are not domain-specific here; anything reaching the
/// top level is an unexpected failure.
pub fn exit_code_for_error(_err: &eyre::Report) -> i32 {
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
