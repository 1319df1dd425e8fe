//! Prompt text and user-message framing for extraction and Q&A.

/// System prompt for structured extraction. Lists the recognized fields and
/// shows one worked example per common page kind.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract information from the text of a web page and return it as a single JSON object.

First decide what kind of page the text comes from (news article, blog post, product page, documentation, general informational page, research paper, and so on). Then pull out the most prominent information using these fields:

- "title": main title of the page or its content.
- "summary": 2-4 sentence overview of what the page is about.
- "main_content_type": one of "article", "product listing", "informational page", "blog post", "FAQ", "documentation", "recipe", or a similar short label.
- "author": author name, for articles and posts.
- "publication_date": publication date, YYYY-MM-DD when possible.
- "product_name": product name, for product pages.
- "price": current price with its currency symbol, e.g. "$199.99". For a price range use the lowest price.
- "currency": ISO currency code of the price, e.g. "USD", "EUR", "INR".
- "availability": stock status, e.g. "In Stock", "Out of Stock", "Limited Stock".
- "rating": average rating, e.g. "4.5 out of 5 stars".
- "number_of_reviews": total number of reviews as a number.
- "key_details": list of the 3-5 most important facts, features or takeaways.

Leave out any field that does not apply or cannot be found, or set it to null. Respond with the JSON object only.

Article example:
{
  "title": "The Future of AI in Healthcare",
  "summary": "AI is changing healthcare from diagnostics to personalized treatment. The article covers current applications, where the technology is heading, and the ethical questions it raises.",
  "main_content_type": "article",
  "author": "Dr. Jane Doe",
  "publication_date": "2025-07-26",
  "key_details": [
    "AI improves diagnostic accuracy",
    "Treatment plans personalized with AI",
    "Open ethical questions"
  ]
}

Product page example:
{
  "title": "XYZ Smartwatch Pro - Advanced Fitness Tracker",
  "summary": "A fitness smartwatch with long battery life and smart notifications, aimed at active users who want style and current technology in one device.",
  "main_content_type": "product listing",
  "product_name": "XYZ Smartwatch Pro",
  "price": "$299.99",
  "currency": "USD",
  "availability": "In Stock",
  "rating": "4.7 out of 5 stars",
  "number_of_reviews": 1250,
  "key_details": [
    "Heart rate monitoring",
    "GPS tracking",
    "5-day battery life",
    "Water resistant"
  ]
}

Informational page example:
{
  "title": "India",
  "summary": "India is a large South Asian country with varied geography, a long history and a diverse culture. It is the most populous country in the world and a major economy.",
  "main_content_type": "informational page",
  "key_details": [
    "Most populous country",
    "Diverse cultural heritage",
    "Major emerging economy"
  ]
}
"#;

/// System prompt for Q&A: answer from the supplied text only.
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's question using ONLY the web page content provided. If the content does not contain the answer, say that you cannot find it in the page.";

/// Leading `max_chars` characters of `text`, cut on a character boundary.
pub fn context_slice(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// User message for the extraction call. A trailing ellipsis marks a cut.
pub fn extraction_user_prompt(text: &str, max_chars: usize) -> String {
    let context = context_slice(text, max_chars);
    let marker = if context.len() < text.len() { "..." } else { "" };
    format!(
        "Extract information from the following web page content:\n\n{}{}",
        context, marker
    )
}

/// User message for a Q&A call.
pub fn answer_user_prompt(text: &str, max_chars: usize, question: &str) -> String {
    format!(
        "Based on the following content, please answer the question:\n\nContent:\n{}\n\nQuestion: {}",
        context_slice(text, max_chars),
        question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RECOGNIZED_FIELDS;

    #[test]
    fn slice_counts_characters_not_bytes() {
        assert_eq!(context_slice("héllo", 2), "hé");
        assert_eq!(context_slice("abc", 10), "abc");
        assert_eq!(context_slice("abc", 0), "");
    }

    #[test]
    fn extraction_prompt_marks_cut_context() {
        let short = extraction_user_prompt("short text", 100);
        assert!(short.ends_with("short text"));

        let long = extraction_user_prompt(&"x".repeat(20), 5);
        assert!(long.ends_with("xxxxx..."));
    }

    #[test]
    fn answer_prompt_carries_question_and_context() {
        let p = answer_user_prompt("The capital is Paris.", 1000, "What is the capital?");
        assert!(p.contains("Content:\nThe capital is Paris."));
        assert!(p.ends_with("Question: What is the capital?"));
    }

    #[test]
    fn system_prompt_names_every_field() {
        for field in RECOGNIZED_FIELDS {
            assert!(
                EXTRACTION_SYSTEM_PROMPT.contains(&format!("\"{field}\"")),
                "{field} missing from prompt"
            );
        }
    }
}
