use encore_core::request::{item::Request, queue::RequestQueue, selection::Selection};

/// Relative artwork references resolve against the game's asset host; full
/// URLs pass through untouched.
const ARTWORK_BASE_URL: &str = "https://ongeki-net.com/ongeki-mobile/img/music/";

pub fn artwork_url(image: &str) -> String {
    if image.starts_with("http") {
        image.to_string()
    } else {
        format!("{}{}", ARTWORK_BASE_URL, image)
    }
}

/// Stable per-user color, hashed from the username into the 216-color cube
/// of the 256-color terminal palette.
pub fn user_color(username: &str) -> u8 {
    let mut hash = 0u32;
    for byte in username.bytes() {
        hash = (byte as u32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    16 + (hash % 216) as u8
}

pub fn render_queue(queue: &RequestQueue, selection: &Selection) -> String {
    if queue.is_empty() {
        return "No requests yet\n".to_string();
    }
    let mut out = String::new();
    for (position, request) in queue.iter().enumerate() {
        let marker = if selection.is_selected(&request.id) {
            '*'
        } else {
            ' '
        };
        out.push_str(&format!(
            "{:>3}. {} {}  (requested by: {})\n",
            position + 1,
            marker,
            request.song.title,
            request.requesters.join(", ")
        ));
    }
    out
}

pub fn render_detail(request: &Request) -> String {
    let song = &request.song;
    let attr = |key: &str| song.attribute(key).unwrap_or("N/A");

    let mut out = String::new();
    out.push_str(&format!("Title:     {}\n", song.title));
    out.push_str(&format!("Artist:    {}\n", attr("artist")));
    out.push_str(&format!(
        "Code:      {}\n",
        song.osr_code.as_deref().unwrap_or("N/A")
    ));
    out.push_str(&format!("Category:  {}\n", attr("category")));
    out.push_str(&format!("Character: {}\n", attr("character")));
    out.push_str(&format!(
        "Levels:    basic {} / advanced {} / expert {} / master {}",
        attr("lev_bas"),
        attr("lev_adv"),
        attr("lev_exc"),
        attr("lev_mas"),
    ));
    if let Some(lunatic) = song.attribute("lev_lnt") {
        out.push_str(&format!(" / lunatic {}", lunatic));
    }
    out.push('\n');
    if let Some(image) = song.attribute("image_url") {
        out.push_str(&format!("Artwork:   {}\n", artwork_url(image)));
    }
    out.push_str(&format!(
        "Requested by: {}\n",
        request.requesters.join(", ")
    ));
    out
}
