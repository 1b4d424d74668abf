// Exchange logging for substrate round-trips
//
// Every phase's request/response pair can be appended to a JSONL file so
// investigations can be audited and replayed offline.

pub mod logger;

pub use logger::ExchangeLogger;
