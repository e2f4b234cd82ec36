pub mod library;
pub mod primitives;
pub mod registry;
pub mod traits;

pub use library::{Library, LibrarySpec, Token, TokenKind, CONSTANT_NAME};
pub use registry::FunctionRegistry;
pub use traits::Primitive;
