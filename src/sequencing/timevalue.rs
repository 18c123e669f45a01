use std::sync::LazyLock;

use regex::Regex;

use crate::context::AudioContext;

/*
Time Strings
============

Anywhere a duration in milliseconds is accepted, a short text form can be
given instead. The forms are tried in this order and the first match wins:

  "440Hz"              period of one cycle         1000 / 440 ms
  "bpm120 l8."         note length at a tempo      60/bpm * 4/len * 1000, dotted
  "bpm90 1.2.240"      bars.beats.units            480 units per beat
  "1.5sec", "2secs"    seconds
  "3min", "1mins"      minutes
  "01:02:03.5"         [h:]m:s[.fff]               fraction is milliseconds
  "bpm120 960ticks"    ticks                       480 ticks per beat
  "22050samples"       samples at the context rate
  "100samples/1000Hz"  samples at an explicit rate
  "250", "250ms"       whole milliseconds

Anything else is zero.

Tempo
-----

Omitting the number after "bpm" uses the context tempo, and so does a tempo
outside 5..=300. Dots extend a note by 1/2, 1/4 and 1/8 of itself:

    dots     0      1      2       3
    factor   1.0    1.5    1.75    1.875

More than three dots fall back to a factor of 1.
*/

const DOTS: [f64; 4] = [1.0, 1.5, 1.75, 1.875];
const UNITS_PER_BEAT: f64 = 480.0;

static HZ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)Hz$").expect("valid regex"));
static NOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^bpm(\d+(?:\.\d+)?)?\s*(?:l(\d+))?(\.*)$").expect("valid regex")
});
static BARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^bpm(\d+(?:\.\d+)?)?\s*(\d+)\.(\d+)\.(\d+)$").expect("valid regex")
});
static SECS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)secs?$").expect("valid regex"));
static MINS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)mins?$").expect("valid regex"));
static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([0-5]?[0-9]):)?(?:([0-5]?[0-9]):)(?:([0-5]?[0-9]))(?:\.([0-9]{1,3}))?$")
        .expect("valid regex")
});
static TICKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^bpm(\d+(?:\.\d+)?)?\s*(?:(\d+)ticks)?$").expect("valid regex")
});
static SAMPLES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)samples(?:/(\d+)Hz)?$").expect("valid regex"));
static MILLIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)(?:ms)?$").expect("valid regex"));

/// Parse a time string into milliseconds. Unrecognised text is `0.0`.
pub fn timevalue(text: &str, ctx: &AudioContext) -> f64 {
    let text = text.trim();

    if let Some(m) = HZ.captures(text) {
        let hz = number(m.get(1));
        return if hz == 0.0 { 0.0 } else { 1000.0 / hz };
    }

    if let Some(m) = NOTE.captures(text) {
        let bpm = tempo(m.get(1), ctx);
        let len = m.get(2).map_or(4.0, |l| integer(Some(l)));
        if bpm == 0.0 || len == 0.0 {
            return 0.0;
        }
        let dots = m.get(3).map_or(0, |d| d.as_str().len());
        let factor = DOTS.get(dots).copied().unwrap_or(1.0);
        return 60.0 / bpm * (4.0 / len) * 1000.0 * factor;
    }

    if let Some(m) = BARS.captures(text) {
        let bpm = tempo(m.get(1), ctx);
        let bars = integer(m.get(2));
        let beats = integer(m.get(3));
        let units = integer(m.get(4));
        let ticks = bars * 4.0 * UNITS_PER_BEAT + beats * UNITS_PER_BEAT + units;
        return 60.0 / bpm * (ticks / UNITS_PER_BEAT) * 1000.0;
    }

    if let Some(m) = SECS.captures(text) {
        return number(m.get(1)) * 1000.0;
    }

    if let Some(m) = MINS.captures(text) {
        return number(m.get(1)) * 60_000.0;
    }

    if let Some(m) = CLOCK.captures(text) {
        let seconds = integer(m.get(1)) * 3600.0 + integer(m.get(2)) * 60.0 + integer(m.get(3));
        let frac = m.get(4).map_or("", |f| f.as_str());
        let millis: String = format!("{frac}00").chars().take(3).collect();
        return seconds * 1000.0 + millis.parse::<f64>().unwrap_or(0.0);
    }

    if let Some(m) = TICKS.captures(text) {
        let bpm = tempo(m.get(1), ctx);
        let ticks = m.get(2).map_or(UNITS_PER_BEAT, |t| integer(Some(t)));
        if bpm == 0.0 {
            return 0.0;
        }
        return 60.0 / bpm * (ticks / UNITS_PER_BEAT) * 1000.0;
    }

    if let Some(m) = SAMPLES.captures(text) {
        let sr = m
            .get(2)
            .map_or(ctx.sample_rate_f64(), |r| integer(Some(r)));
        if sr == 0.0 {
            return 0.0;
        }
        return integer(m.get(1)) / sr * 1000.0;
    }

    if let Some(m) = MILLIS.captures(text) {
        return integer(m.get(1));
    }

    0.0
}

fn number(m: Option<regex::Match<'_>>) -> f64 {
    m.and_then(|m| m.as_str().parse::<f64>().ok()).unwrap_or(0.0)
}

fn integer(m: Option<regex::Match<'_>>) -> f64 {
    number(m).trunc()
}

fn tempo(m: Option<regex::Match<'_>>, ctx: &AudioContext) -> f64 {
    match m {
        None => ctx.bpm(),
        Some(m) => {
            let bpm = number(Some(m));
            if (5.0..=300.0).contains(&bpm) {
                bpm
            } else {
                ctx.bpm()
            }
        }
    }
}
