pub mod candle;
pub mod pair;
pub mod request_params;
pub mod series;
pub mod timeframe;
pub mod timestamp;
