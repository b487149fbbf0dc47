// There is no stable route to ask which models a free-tier key may use, so
// this list has to be updated whenever models are retired. Ordered fastest
// and most available first.
pub(crate) const BUILTIN_MODELS: [&str; 4] = [
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash-lite",
    "gemini-2.0-flash",
    "gemini-2.5-flash",
];
