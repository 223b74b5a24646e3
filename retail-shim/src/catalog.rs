//! Canned storefront data: products, recommendations, analytics and the
//! chat assistant's scripted replies.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    /// Price in paise.
    pub price: u32,
    pub rating: f32,
    pub image_url: &'static str,
    pub stock_quantity: u32,
}

pub const PRODUCTS: &[Product] = &[
    Product {
        id: "1",
        name: "Premium Wireless Headphones",
        description: "High-quality noise-canceling headphones with premium sound",
        category: "Electronics",
        price: 24999,
        rating: 4.8,
        image_url: "https://images.unsplash.com/photo-1505740420928-5e560c06d30e?w=500",
        stock_quantity: 50,
    },
    Product {
        id: "2",
        name: "Smart Fitness Watch",
        description: "Track your health and fitness with advanced sensors",
        category: "Electronics",
        price: 16699,
        rating: 4.6,
        image_url: "https://images.unsplash.com/photo-1523275335684-37898b6baf30?w=500",
        stock_quantity: 30,
    },
    Product {
        id: "3",
        name: "Designer Backpack",
        description: "Stylish and functional backpack for everyday use",
        category: "Fashion",
        price: 7499,
        rating: 4.5,
        image_url: "https://images.unsplash.com/photo-1553062407-98eeb64c6a62?w=500",
        stock_quantity: 25,
    },
    Product {
        id: "4",
        name: "Organic Coffee Beans",
        description: "Premium organic coffee beans from sustainable farms",
        category: "Food",
        price: 2099,
        rating: 4.9,
        image_url: "https://images.unsplash.com/photo-1559056199-641a0ac8b55e?w=500",
        stock_quantity: 100,
    },
    Product {
        id: "5",
        name: "Yoga Mat Pro",
        description: "Professional-grade yoga mat with superior grip",
        category: "Sports",
        price: 4199,
        rating: 4.7,
        image_url: "https://images.unsplash.com/photo-1544367567-0f2fcb009e0b?w=500",
        stock_quantity: 40,
    },
    Product {
        id: "6",
        name: "Smart Home Speaker",
        description: "Voice-controlled smart speaker with premium audio",
        category: "Electronics",
        price: 12499,
        rating: 4.4,
        image_url: "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=500",
        stock_quantity: 35,
    },
];

pub fn product(id: &str) -> Option<&'static Product> {
    PRODUCTS.iter().find(|p| p.id == id)
}

/// Highest rated first.
pub fn featured(limit: usize) -> Vec<&'static Product> {
    let mut products: Vec<_> = PRODUCTS.iter().collect();
    products.sort_by(|a, b| b.rating.total_cmp(&a.rating));
    products.truncate(limit);
    products
}

/// Case-insensitive match on name, description or category.
pub fn search(query: &str, limit: usize) -> Vec<&'static Product> {
    let needle = query.trim().to_lowercase();
    PRODUCTS
        .iter()
        .filter(|p| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
                || p.category.to_lowercase().contains(&needle)
        })
        .take(limit)
        .collect()
}

pub fn by_category(category: &str, limit: usize) -> Vec<&'static Product> {
    PRODUCTS
        .iter()
        .filter(|p| p.category.eq_ignore_ascii_case(category))
        .take(limit)
        .collect()
}

/// Same category as `product_id`, excluding the product itself.
pub fn similar(product_id: &str, limit: usize) -> Option<Vec<&'static Product>> {
    let base = product(product_id)?;
    Some(
        PRODUCTS
            .iter()
            .filter(|p| p.id != base.id && p.category == base.category)
            .take(limit)
            .collect(),
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub product_id: &'static str,
    pub score: f32,
    pub reason: &'static str,
}

pub fn recommendations(limit: usize) -> Vec<Recommendation> {
    const REASONS: [&str; 2] = [
        "Based on your interest in electronics",
        "Popular in your area",
    ];
    featured(limit)
        .into_iter()
        .enumerate()
        .map(|(i, p)| Recommendation {
            id: format!("rec-{}", i + 1),
            product_id: p.id,
            score: (p.rating / 5.0 * 100.0).round() / 100.0,
            reason: REASONS[i % REASONS.len()],
        })
        .collect()
}

pub fn analytics() -> serde_json::Value {
    serde_json::json!({
        "total_users": 10543,
        "total_products": 500,
        "total_orders": 2847,
        "revenue": 2847000,
        "growth_rate": 15.2,
        "popular_categories": [
            { "name": "Electronics", "percentage": 35 },
            { "name": "Fashion", "percentage": 28 },
            { "name": "Home & Garden", "percentage": 20 },
            { "name": "Sports", "percentage": 17 }
        ]
    })
}

pub fn chat_reply(message: &str) -> String {
    let message = message.to_lowercase();
    let mut reply = String::from("I'm here to help you find the perfect products! ");
    if message.contains("headphones") {
        reply.push_str(
            "I recommend our Premium Wireless Headphones - they have excellent noise cancellation and are very popular!",
        );
    } else if message.contains("price") || message.contains("cost") {
        reply.push_str("Our products range from ₹2,099 to ₹24,999. What's your budget?");
    } else if message.contains("electronics") {
        reply.push_str(
            "We have great electronics including headphones, fitness watches, and smart speakers!",
        );
    } else {
        reply.push_str(
            "You can browse our products or ask me about specific categories like electronics, fashion, or sports items.",
        );
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_featured_orders_by_rating_and_limits() {
        let top = featured(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Organic Coffee Beans");
        assert_eq!(top[1].name, "Premium Wireless Headphones");
    }

    #[test]
    fn test_search_matches_category_case_insensitively() {
        let hits = search("ELECTRONICS", 10);
        assert_eq!(hits.len(), 3);
        assert!(search("no such thing", 10).is_empty());
    }

    #[test]
    fn test_similar_excludes_the_product_itself() {
        let similar = similar("1", 10).unwrap();
        assert!(similar.iter().all(|p| p.id != "1" && p.category == "Electronics"));
        assert!(super::similar("missing", 10).is_none());
    }

    #[test]
    fn test_chat_reply_picks_topic() {
        assert!(chat_reply("Any good Headphones?").contains("Premium Wireless Headphones"));
        assert!(chat_reply("what does it cost").contains("budget"));
        assert!(chat_reply("hello").contains("browse our products"));
    }
}
