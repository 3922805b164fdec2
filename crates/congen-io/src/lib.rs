pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod results;
pub mod writer;

pub use config::{BatchConfig, Config, InputType, RandomInstanceConfig, RunConfig};
pub use error::{ConfigError, IoError};
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::{MpsModel, ParseError, Parser, read_mps};
pub use results::{MethodResult, MethodSummary, RunRecord, Summary, analyze_dir, write_json, write_record};
pub use writer::{to_mps_string, write_mps};
