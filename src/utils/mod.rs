mod byte_cursor;

pub use self::byte_cursor::ByteCursor;
