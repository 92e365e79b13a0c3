//! # Identifier Naming
//!
//! Every generator derives type, route, parameter and handler names from
//! entity and field codes through this module, so one logical name renders
//! the same way in every artifact.
//!
//! | Input | Function | Output |
//! |-------|----------|--------|
//! | `orderItem` | [`result_type_name`] | `OrderItemJoinRow` |
//! | `orderItem` | [`route_path`] (`api/v1`) | `/api/v1/order-item-join` |
//! | `orderItem` | [`handler_name`] | `list_order_item_join` |
//! | `user`, `createdAt` | [`query_param_name`] | `user_created_at` |
//! | `user`, `createdAt` | [`default_alias`] | `user_createdAt` |

use heck::{ToKebabCase, ToLowerCamelCase, ToPascalCase, ToSnakeCase};

/// Rust keywords that cannot be used as plain field names
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "yield",
];

// ============================================================================
// Case conversion
// ============================================================================

/// `blog_post` → `BlogPost`
pub fn pascal(name: &str) -> String {
    name.to_pascal_case()
}

/// `blog_post` → `blogPost`
pub fn camel(name: &str) -> String {
    name.to_lower_camel_case()
}

/// `BlogPost` → `blog_post`
pub fn snake(name: &str) -> String {
    name.to_snake_case()
}

/// `BlogPost` → `blog-post`
pub fn kebab(name: &str) -> String {
    name.to_kebab_case()
}

// ============================================================================
// Query-level names
// ============================================================================

/// Alias used for a selected field when none is given; the validator assigns it
pub use metaquery_ir::default_alias;

/// Result-row type for a join query rooted at `main_code`
pub fn result_type_name(main_code: &str) -> String {
    format!("{}JoinRow", pascal(main_code))
}

/// Paged wrapper around [`result_type_name`]
pub fn page_type_name(main_code: &str) -> String {
    format!("{}JoinPage", pascal(main_code))
}

/// Query-parameter struct of the read endpoint
pub fn query_struct_name(main_code: &str) -> String {
    format!("{}JoinQuery", pascal(main_code))
}

/// Route of the read endpoint, e.g. `/api/v1/user-join`
pub fn route_path(prefix: &str, main_code: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("/{}-join", kebab(main_code))
    } else {
        format!("/{}/{}-join", prefix, kebab(main_code))
    }
}

/// Handler function of the read endpoint
pub fn handler_name(main_code: &str) -> String {
    format!("list_{}_join", snake(main_code))
}

/// Function that mounts the read endpoint
pub fn routes_fn_name(main_code: &str) -> String {
    format!("{}_join_routes", snake(main_code))
}

/// Query parameter for a filter on `entity_code.field_code`
pub fn query_param_name(entity_code: &str, field_code: &str) -> String {
    format!("{}_{}", snake(entity_code), snake(field_code))
}

/// Rust field name for a result alias, escaping keywords
pub fn rust_field_ident(alias: &str) -> String {
    let name = snake(alias);
    if RUST_KEYWORDS.contains(&name.as_str()) {
        format!("r#{}", name)
    } else {
        name
    }
}

/// Constant holding the SQL text of a query rooted at `main_code`
pub fn sql_const_name(main_code: &str) -> String {
    format!("{}_JOIN_SQL", snake(main_code).to_uppercase())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversion() {
        assert_eq!(pascal("order_item"), "OrderItem");
        assert_eq!(camel("order_item"), "orderItem");
        assert_eq!(snake("orderItem"), "order_item");
        assert_eq!(kebab("orderItem"), "order-item");
    }

    #[test]
    fn test_query_names() {
        assert_eq!(default_alias("user", "id"), "user_id");
        assert_eq!(result_type_name("orderItem"), "OrderItemJoinRow");
        assert_eq!(page_type_name("user"), "UserJoinPage");
        assert_eq!(query_struct_name("user"), "UserJoinQuery");
        assert_eq!(handler_name("orderItem"), "list_order_item_join");
        assert_eq!(routes_fn_name("user"), "user_join_routes");
        assert_eq!(query_param_name("user", "createdAt"), "user_created_at");
        assert_eq!(sql_const_name("orderItem"), "ORDER_ITEM_JOIN_SQL");
    }

    #[test]
    fn test_route_path() {
        assert_eq!(route_path("api/v1", "orderItem"), "/api/v1/order-item-join");
        assert_eq!(route_path("/api/", "user"), "/api/user-join");
        assert_eq!(route_path("", "user"), "/user-join");
    }

    #[test]
    fn test_rust_field_ident() {
        assert_eq!(rust_field_ident("userName"), "user_name");
        assert_eq!(rust_field_ident("type"), "r#type");
    }
}
