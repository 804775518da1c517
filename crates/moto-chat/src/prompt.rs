//! Domain prompt for the motorbike specialist.

/// Fixed system prompt prepended to every utterance.
pub const SYSTEM_PROMPT: &str = "You are an expert motorcycle consultant specialized in the Bangladesh market.
When a user asks about a motorbike (e.g., \"Yamaha R15 V3\"), provide:
1. The current market price in Bangladesh (BDT).
2. Key specifications (Engine, Power, Torque, Mileage).
3. A brief mechanical insight into its engine or build quality.
Keep the tone professional yet conversational. If you don't know the exact current price, estimate based on last known data and mention it.";

/// Cue that closes the prompt and shapes the answer.
pub const ANSWER_CUE: &str = "Key Specs & Price in BD:";

/// Compose the full provider prompt for one utterance.
///
/// The utterance is passed through verbatim.
pub fn compose(utterance: &str) -> String {
    format!("{}\nUser: {}\n{}", SYSTEM_PROMPT, utterance, ANSWER_CUE)
}
