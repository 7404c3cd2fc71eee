//! Conversions from wire DTOs to domain models.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use shopfront_core::{Email, ImageRef, Money, Role};

use super::types::{
    AnalyticsDto, CartItemDto, CategoryDto, FaqDto, OrderDto, ProductDetailDto, ProductDto,
    ProfileDto, ReviewDto, WireDate, WishlistDto,
};
use crate::models::{
    Analytics, CartItem, Category, Faq, Order, OrderSummary, Product, ProductDetail, Review,
    UserProfile, WishlistItem,
};

pub fn convert_product(dto: ProductDto) -> Product {
    Product {
        id: dto.id,
        name: dto.name,
        description: dto.description.unwrap_or_default(),
        price: dto.price,
        discount_price: dto.discount_price,
        category_id: dto.category_id,
        category_name: dto.category_name,
        image: dto.byte_img.and_then(ImageRef::from_base64),
        stock: dto.quantity.map(clamp_count),
    }
}

pub fn convert_products(dtos: Vec<ProductDto>) -> Vec<Product> {
    dtos.into_iter().map(convert_product).collect()
}

fn convert_review(dto: ReviewDto) -> Review {
    Review {
        id: dto.id,
        rating: dto
            .rating
            .map_or(0, |r| u8::try_from(r.clamp(0, 5)).unwrap_or(0)),
        description: dto.description.unwrap_or_default(),
        username: dto.username.unwrap_or_default(),
        image: dto.returned_img.and_then(ImageRef::from_base64),
    }
}

pub fn convert_faq(dto: FaqDto) -> Faq {
    Faq {
        id: dto.id,
        question: dto.question,
        answer: dto.answer,
    }
}

pub fn convert_product_detail(dto: ProductDetailDto) -> ProductDetail {
    ProductDetail {
        product: convert_product(dto.product_dto),
        reviews: dto.review_dto_list.into_iter().map(convert_review).collect(),
        faqs: dto.faq_dto_list.into_iter().map(convert_faq).collect(),
    }
}

pub fn convert_category(dto: CategoryDto) -> Category {
    Category {
        id: dto.id,
        name: dto.name,
        description: dto.description.unwrap_or_default(),
    }
}

/// A cart line, or `None` for a line with no units.
fn convert_cart_item(dto: CartItemDto) -> Option<CartItem> {
    let quantity = clamp_count(dto.quantity);
    (quantity > 0).then(|| CartItem {
        id: dto.id,
        product_id: dto.product_id,
        name: dto.product_name.unwrap_or_default(),
        price: dto.price,
        quantity,
        image: dto.returned_img.and_then(ImageRef::from_base64),
    })
}

pub fn convert_order(dto: OrderDto) -> Order {
    let total_amount = dto.total_amount.unwrap_or_default();
    Order {
        id: dto.id,
        description: dto.order_description,
        date: dto.date.as_ref().and_then(convert_date),
        address: dto.address,
        payment: dto.payment,
        status: dto.order_status,
        tracking_id: dto.tracking_id,
        user_name: dto.user_name,
        summary: OrderSummary {
            amount: dto.amount.unwrap_or(total_amount),
            total_amount,
            discount: dto.discount.unwrap_or(Money::ZERO),
            coupon_name: dto.coupon_name,
        },
        items: dto
            .cart_items
            .into_iter()
            .filter_map(convert_cart_item)
            .collect(),
    }
}

pub fn convert_orders(dtos: Vec<OrderDto>) -> Vec<Order> {
    dtos.into_iter().map(convert_order).collect()
}

pub fn convert_wishlist_item(dto: WishlistDto) -> WishlistItem {
    WishlistItem {
        id: dto.id,
        product_id: dto.product_id,
        name: dto.product_name.unwrap_or_default(),
        price: dto.price.unwrap_or_default(),
        description: dto.product_description,
        image: dto.returned_img.and_then(ImageRef::from_base64),
    }
}

pub fn convert_profile(dto: ProfileDto) -> UserProfile {
    let email = dto.email.as_deref().and_then(|e| Email::parse(e).ok());
    let name = dto
        .name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| email.as_ref().map(|e| e.as_str().to_string()))
        .unwrap_or_default();

    UserProfile {
        id: dto.id,
        subject: dto.keycloak_id,
        email,
        name,
        role: dto.role.as_deref().map_or(Role::Customer, Role::from_claim),
        image: dto.img.and_then(ImageRef::from_base64),
    }
}

pub fn convert_analytics(dto: AnalyticsDto) -> Analytics {
    Analytics {
        placed: clamp_total(dto.placed),
        shipped: clamp_total(dto.shipped),
        delivered: clamp_total(dto.delivered),
        current_month_orders: clamp_total(dto.current_month_orders),
        previous_month_orders: clamp_total(dto.previous_month_orders),
        current_month_earnings: dto.current_month_earnings,
        previous_month_earnings: dto.previous_month_earnings,
    }
}

fn convert_date(date: &WireDate) -> Option<DateTime<Utc>> {
    match date {
        WireDate::Millis(millis) => DateTime::from_timestamp_millis(*millis),
        WireDate::Text(text) => DateTime::parse_from_rfc3339(text)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|d| d.and_utc())
            })
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|d| d.and_utc())
            }),
    }
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn clamp_total(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
