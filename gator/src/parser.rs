use crate::types::{AggregatorError, Result, RssFeed};
use tracing::debug;

pub struct FeedParser;

impl FeedParser {
    /// Decodes an RSS 2.0 body and unescapes HTML entities in the channel
    /// and item text fields.
    pub fn parse_feed(content: &str) -> Result<RssFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let mut feed: RssFeed = quick_xml::de::from_str(content)
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        Self::unescape_feed(&mut feed);

        debug!("Parsed feed with {} items", feed.channel.items.len());
        Ok(feed)
    }

    /// Entities that survive XML decoding (for example `&amp;amp;` or a
    /// double-escaped `&lt;p&gt;`) are resolved here, in place.
    pub fn unescape_feed(feed: &mut RssFeed) {
        let channel = &mut feed.channel;
        channel.title = unescape(&channel.title);
        channel.description = unescape(&channel.description);

        for item in channel.items.iter_mut() {
            item.title = unescape(&item.title);
            item.description = unescape(&item.description);
        }
    }
}

fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
