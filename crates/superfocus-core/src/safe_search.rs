//! Child-safe video search.
//!
//! Search results are filtered against a static allow-list of educational
//! channels. Matching is a case-insensitive substring test on the channel
//! title: a channel not on the list is always excluded, even when benign.
//! A channel whose title merely contains an allowed name also passes.

use crate::contracts::Video;

/// Allow-listed channel names.
pub const SAFE_CHANNELS: &[&str] = &[
    "Khan Academy",
    "Crash Course",
    "SciShow",
    "TED-Ed",
    "National Geographic Kids",
    "PBS Kids",
    "Numberphile",
    "Math Antics",
    "3Blue1Brown",
    "Amoeba Sisters",
    "Bozeman Science",
    "Free School",
    "Homeschool Pop",
    "Learn Bright",
    "Mark Rober",
    "Smarter Every Day",
    "Veritasium",
    "Vsauce",
    "Kurzgesagt",
    "MinutePhysics",
    "MinuteEarth",
    "Operation Ouch",
    "Peekaboo Kidz",
    "Periodic Videos",
    "Physics Girl",
    "Professor Dave Explains",
    "Mr. DeMaio",
    "The Organic Chemistry Tutor",
    "Scratch Garden",
    "Jack Hartmann",
    "Storyline Online",
    "Art for Kids Hub",
    "Cosmic Kids Yoga",
    "GoNoodle",
    "Geography Now",
    "Simple History",
    "Extra History",
    "The Brain Scoop",
    "NASA",
    "Smithsonian",
    "BBC Bitesize",
];

/// Number of channels folded into the search string.
const QUERY_CHANNELS: usize = 5;

/// Builds the provider search string for `q`, biased toward safe channels.
pub fn build_search_query(q: &str, subject: Option<&str>) -> String {
    let mut terms: Vec<&str> = Vec::with_capacity(2);
    if let Some(subject) = subject.map(str::trim).filter(|s| !s.is_empty()) {
        terms.push(subject);
    }
    terms.push(q.trim());
    let channels = SAFE_CHANNELS[..QUERY_CHANNELS].join("|");
    format!("{} {channels}", terms.join(" "))
}

/// Returns `true` if `channel` contains an allow-listed name.
pub fn is_safe_channel(channel: &str) -> bool {
    let channel = channel.to_lowercase();
    SAFE_CHANNELS
        .iter()
        .any(|safe| channel.contains(&safe.to_lowercase()))
}

/// Keeps only videos from allow-listed channels, in their original order.
pub fn filter_safe(videos: Vec<Video>) -> Vec<Video> {
    videos
        .into_iter()
        .filter(|video| is_safe_channel(&video.channel_title))
        .collect()
}

/// How many raw results to request so that `wanted` survive filtering.
pub fn fetch_size(wanted: u32) -> u32 {
    wanted.saturating_mul(3).min(50)
}
