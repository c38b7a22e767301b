/// Router Module Index
///
/// Routes are split by the authentication they need. Per-record ownership is never decided
/// here: handlers ask the `guard` module once the target record is loaded.

/// Routes open to every viewer, anonymous included. Read handlers filter through the
/// visibility rule; the two soft-redirecting edits also live here so that anonymous
/// visitors get redirected instead of rejected.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware. Requests without valid credentials
/// are rejected with 401 before reaching a handler.
pub mod authenticated;
