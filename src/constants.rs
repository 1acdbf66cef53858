// API Constants
pub const CHAT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const IMAGE_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";

// Sampling parameters are fixed per build and not user-editable.
pub const TEMPERATURE: f64 = 1.0;
pub const TOP_P: f64 = 0.95;
pub const TOP_K: u32 = 64;
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

// Assistant identity
pub const ASSISTANT_NAME: &str = "Lumina";
pub const WELCOME_MESSAGE_ID: &str = "welcome-message";

pub const SYSTEM_INSTRUCTION: &str = "You are \"Lumina\", a highly capable, broadly \
knowledgeable AI assistant. Your task is to give thorough, accurate and inventive \
answers across every field, from science and technology to art, history and \
philosophy. Use web search effectively so that your information stays current and \
backed by reliable sources. Be creative, helpful, and impressive in the breadth of \
your knowledge.";

pub const IMAGE_HISTORY_LIMIT: usize = 50;

// User-facing error texts. The classifier in errors.rs maps every transport
// failure onto exactly one of these.
pub const ERR_CONNECTIVITY: &str =
    "Could not reach the network. Please check your internet connection and try again.";
pub const ERR_BAD_REQUEST: &str =
    "Something went wrong while processing your request. Please try again.";
pub const ERR_RATE_LIMITED: &str =
    "You have sent too many requests. Please wait a moment and try again.";
pub const ERR_SERVICE_UNAVAILABLE: &str =
    "The service is currently unavailable or under heavy load. Please try again later.";
pub const ERR_UNKNOWN: &str = "Sorry, an unexpected error occurred. Please try again.";

pub const ERR_IMAGE_NO_OUTPUT: &str = "The model returned no image for this prompt.";
