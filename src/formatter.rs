//! Reply formatting for activity lists

use crate::models::Activity;

pub const NO_MATCHES: &str = "Sorry, I couldn't find any matching activities.";
const HEADER: &str = "Here are some activities that might interest you:\n\n";

/// Name, description and link per activity, blank line between entries.
pub fn format_activities(activities: &[Activity]) -> String {
    if activities.is_empty() {
        return NO_MATCHES.to_string();
    }

    let mut out = String::from(HEADER);
    for activity in activities {
        out.push_str(&format!("Name: {}\n", activity.name));
        out.push_str(&format!("Description: {}\n", activity.description));
        out.push_str(&format!("Link: {}\n\n", activity.link));
    }
    out
}
