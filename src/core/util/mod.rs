pub mod fanout;
pub mod quantity;
pub mod time_util;
