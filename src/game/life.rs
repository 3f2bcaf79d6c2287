pub const MAX_HEALTH: i32 = 100;

pub struct LifeChange;
impl LifeChange {
    pub const PERFECT: i32 = 1;
    pub const GREAT: i32 = 0;
    pub const GOOD: i32 = -2;
    pub const MISS: i32 = -10;
    pub const HOLD_HELD: i32 = 1;
    pub const HOLD_LET_GO: i32 = -10;
}
