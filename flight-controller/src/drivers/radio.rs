/// Raw channel access over whichever receiver is fitted. The pulse-width
/// reader and the single-wire serial receiver both present this shape; the
/// settings blob's channel tables absorb their differing ranges.
pub trait RadioSource {
    fn get_channel(&self, index: u8) -> i32;
}
