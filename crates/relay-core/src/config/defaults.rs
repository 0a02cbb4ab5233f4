//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "relay".to_string()
}

pub fn default_data_dir() -> String {
    "~/.relay".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    5050
}

pub fn default_body_limit() -> usize {
    1024 * 1024
}

pub fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

pub fn default_graph_api_version() -> String {
    "v23.0".to_string()
}

pub fn default_http_timeout_secs() -> u64 {
    30
}

pub fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_temperature() -> f32 {
    0.8
}

pub fn default_max_tokens() -> u32 {
    300
}

pub fn default_db_path() -> String {
    "~/.relay/data/relay.db".to_string()
}

pub fn default_max_context() -> usize {
    20
}

pub fn default_system_prompt() -> String {
    "You are the sales and after-sales assistant of a small family business. \
     Answer warmly and professionally in 1 to 4 short sentences, \
     and end with an open question when it helps the customer move forward."
        .to_string()
}

pub fn default_fallback_reply() -> String {
    "Thanks for your message \u{1f44b} We have received it and will get back to you shortly."
        .to_string()
}

pub fn default_non_text_placeholder() -> String {
    "(non-text message received)".to_string()
}

pub fn default_greeting() -> String {
    "Hello".to_string()
}

pub fn default_closing_probability() -> f64 {
    0.5
}

pub fn default_closing_keywords() -> Vec<String> {
    [
        "price",
        "quote",
        "delivery",
        "schedule",
        "available",
        "stock",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_closing_questions() -> Vec<String> {
    [
        "Would you like me to estimate the area and delivery for you?",
        "Do you already have a date in mind?",
        "Shall I walk you through the maintenance steps?",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_followup_poll_secs() -> u64 {
    60
}

pub fn default_min_silence_secs() -> u64 {
    10 * 60
}

pub fn default_max_window_secs() -> u64 {
    24 * 60 * 60
}

pub fn default_nudges() -> Vec<String> {
    [
        "Would you like some help estimating the area or the delivery?",
        "Happy to help you compare our options if you are hesitating.",
        "Need a quick recap on maintenance (watering, mowing, fertilizer)?",
        "I'm still here if you have any question \u{1f642}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_promotion_weekday() -> String {
    "fri".to_string()
}

pub fn default_promotion_time() -> String {
    "20:59".to_string()
}

pub fn default_promotion_template() -> String {
    "hello_world".to_string()
}

pub fn default_promotion_language() -> String {
    "en_US".to_string()
}
