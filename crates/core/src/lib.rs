pub mod enrollment;
pub mod imaging;
pub mod matching;
pub mod shared;
pub mod storage;
