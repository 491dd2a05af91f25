/// Piezo cues. The distinct success/failure tones matter: the settings
/// push path reports its outcome through them.
pub trait Beeper {
    fn beep_hz(&mut self, hz: u32, ms: u32);
    fn cue_success(&mut self);
    fn cue_failure(&mut self);
    fn cue_disarm(&mut self);
    fn cue_tune(&mut self);
    fn alarm_on(&mut self, hz: u32);
    fn alarm_off(&mut self);
}
