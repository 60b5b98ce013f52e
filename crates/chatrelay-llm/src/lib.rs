pub mod gateway;
pub mod mock;
pub mod provider;
pub mod translate;

pub use gateway::{ChatGateway, TranslationGateway};
pub use mock::{MockChatModel, MockTranslator};
pub use provider::NvidiaProvider;
pub use translate::RivaTranslator;
