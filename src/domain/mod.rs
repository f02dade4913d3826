// 領域層：調性、使用者與歷史紀錄的型別，以及儲存/身分切換的 port

pub mod model;
pub mod ports;
