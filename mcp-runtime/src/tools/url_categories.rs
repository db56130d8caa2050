use serde_json::{Map, Value, json};
use zia_mcp_core::{CallContext, ToolError, check_confirmation};

use super::args::{
    arg_optional_bool, arg_optional_string, optional_string_list, parse_query_pairs, required_id,
    required_string, required_string_list,
};
use super::{
    ServiceTarget, ToolAccess, ToolContext, ToolDefinition, ToolOutput, id_schema, list_schema,
    object_schema,
};
use crate::client::UrlCategoryDraft;

/// The lookup endpoint classifies at most this many URLs per request.
pub const URL_LOOKUP_BATCH_SIZE: usize = 100;

const OPTIONAL_LISTS: [(&str, &str); 6] = [
    ("urls", "URLs to include."),
    ("keywords", "Keywords to include."),
    ("ip_ranges", "IP ranges (CIDR) to include."),
    ("db_categorized_urls", "URLs retaining their database category."),
    (
        "keywords_retaining_parent_category",
        "Keywords retaining the parent category.",
    ),
    (
        "ip_ranges_retaining_parent_category",
        "IP ranges retaining the parent category.",
    ),
];

/// Fields shared by the create and update schemas.
fn category_properties() -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("configured_name".into(), json!({ "type": "string" }));
    props.insert("description".into(), json!({ "type": "string" }));
    for (key, description) in OPTIONAL_LISTS {
        props.insert(key.into(), list_schema(description));
    }
    props
}

fn url_list_schema() -> Value {
    let mut props = Map::new();
    props.insert("category_id".into(), id_schema("URL category ID."));
    props.insert("configured_name".into(), json!({ "type": "string" }));
    props.insert("urls".into(), list_schema("URLs to add or remove."));
    Value::Object(props)
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    let mut create_props = category_properties();
    create_props.insert(
        "super_category".into(),
        json!({ "type": "string", "description": "Parent category, e.g. USER_DEFINED." }),
    );
    create_props.insert(
        "custom_category".into(),
        json!({ "type": "boolean", "default": true }),
    );

    let mut update_props = category_properties();
    update_props.insert("category_id".into(), id_schema("URL category ID."));

    vec![
        ToolDefinition {
            name: "zia_list_url_categories",
            description: "List URL categories. query_params is forwarded to the API as-is.",
            input_schema: object_schema(
                json!({
                    "query_params": {
                        "description": "Query parameters as an object, a [{key, value}] array, or a JSON string of either.",
                        "type": ["object", "array", "string"]
                    }
                }),
                &[],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_url_lookup",
            description: "Look up the classification of URLs. Large inputs are split into batches of 100 and results come back in input order.",
            input_schema: object_schema(
                json!({ "urls": list_schema("URLs to classify.") }),
                &["urls"],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_get_url_category",
            description: "Get one URL category by ID.",
            input_schema: object_schema(
                json!({ "category_id": id_schema("URL category ID.") }),
                &["category_id"],
                ToolAccess::Read,
            ),
            access: ToolAccess::Read,
        },
        ToolDefinition {
            name: "zia_create_url_category",
            description: "Create a URL category.",
            input_schema: object_schema(
                Value::Object(create_props),
                &["configured_name", "super_category"],
                ToolAccess::Write,
            ),
            access: ToolAccess::Write,
        },
        ToolDefinition {
            name: "zia_update_url_category",
            description: "Update a URL category. Omitted or empty lists keep their current contents.",
            input_schema: object_schema(
                Value::Object(update_props),
                &["category_id", "configured_name"],
                ToolAccess::Write,
            ),
            access: ToolAccess::Write,
        },
        ToolDefinition {
            name: "zia_add_urls_to_category",
            description: "Add URLs to a URL category without replacing existing ones.",
            input_schema: object_schema(
                url_list_schema(),
                &["category_id", "configured_name", "urls"],
                ToolAccess::Write,
            ),
            access: ToolAccess::Write,
        },
        ToolDefinition {
            name: "zia_remove_urls_from_category",
            description: "Remove URLs from a URL category. Irreversible; returns a confirmation request until re-invoked with confirmation.",
            input_schema: object_schema(
                url_list_schema(),
                &["category_id", "configured_name", "urls"],
                ToolAccess::Destructive,
            ),
            access: ToolAccess::Destructive,
        },
        ToolDefinition {
            name: "zia_delete_url_category",
            description: "Delete a URL category. Irreversible; returns a confirmation request until re-invoked with confirmation.",
            input_schema: object_schema(
                json!({ "category_id": id_schema("URL category ID.") }),
                &["category_id"],
                ToolAccess::Destructive,
            ),
            access: ToolAccess::Destructive,
        },
    ]
}

pub(super) async fn list_url_categories(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let query = parse_query_pairs("query_params", args.get("query_params"))?;
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let categories = client
        .url_categories()
        .list_categories(&query)
        .await
        .into_result("list URL categories", None)?;
    Ok(ToolOutput::resources(categories))
}

/// Non-object results are kept, wrapped with their text form.
fn lookup_entry(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let text = match &other {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            };
            let mut map = Map::new();
            map.insert("url".into(), Value::String(text));
            map.insert("raw".into(), other);
            map
        }
    }
}

pub(super) async fn url_lookup(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let urls = required_string_list(args, "urls", "URL")?;
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let mut results = Vec::with_capacity(urls.len());
    for (index, batch) in urls.chunks(URL_LOOKUP_BATCH_SIZE).enumerate() {
        if index > 0 && !ctx.url_lookup_delay().is_zero() {
            tokio::time::sleep(ctx.url_lookup_delay()).await;
        }
        tracing::debug!(batch = index, size = batch.len(), "url lookup batch");
        let classified = client
            .url_categories()
            .lookup(batch)
            .await
            .into_result("look up URLs", None)?;
        results.extend(classified.into_iter().map(lookup_entry));
    }
    Ok(ToolOutput::Resources(results))
}

pub(super) async fn get_url_category(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let category_id = required_id(args, "category_id")?;
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let category = client
        .url_categories()
        .get_category(&category_id)
        .await
        .into_result(
            &format!("get URL category {category_id}"),
            Some(category_id.as_str()),
        )?;
    Ok(ToolOutput::resource(category))
}

fn read_draft(
    args: &Map<String, Value>,
    configured_name: String,
) -> Result<UrlCategoryDraft, ToolError> {
    Ok(UrlCategoryDraft {
        configured_name,
        super_category: arg_optional_string(args, "super_category")?,
        description: arg_optional_string(args, "description")?,
        custom_category: arg_optional_bool(args, "custom_category")?,
        urls: optional_string_list(args, "urls")?,
        keywords: optional_string_list(args, "keywords")?,
        ip_ranges: optional_string_list(args, "ip_ranges")?,
        db_categorized_urls: optional_string_list(args, "db_categorized_urls")?,
        keywords_retaining_parent_category: optional_string_list(
            args,
            "keywords_retaining_parent_category",
        )?,
        ip_ranges_retaining_parent_category: optional_string_list(
            args,
            "ip_ranges_retaining_parent_category",
        )?,
    })
}

pub(super) async fn create_url_category(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let configured_name = required_string(args, "configured_name")?;
    let super_category = required_string(args, "super_category")?;
    let mut draft = read_draft(args, configured_name)?;
    draft.super_category = Some(super_category);
    draft.custom_category = Some(draft.custom_category.unwrap_or(true));
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let created = client
        .url_categories()
        .add_url_category(&draft)
        .await
        .into_result(
            "create URL category",
            Some(draft.configured_name.as_str()),
        )?;
    tracing::info!(configured_name = %draft.configured_name, "url category created");
    Ok(ToolOutput::resource(created))
}

pub(super) async fn update_url_category(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let category_id = required_id(args, "category_id")?;
    let configured_name = required_string(args, "configured_name")?;
    let draft = read_draft(args, configured_name)?;
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let updated = client
        .url_categories()
        .update_url_category(&category_id, &draft)
        .await
        .into_result(
            &format!("update URL category {category_id}"),
            Some(category_id.as_str()),
        )?;
    Ok(ToolOutput::resource(updated))
}

pub(super) async fn add_urls_to_category(
    ctx: &ToolContext,
    args: &Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let category_id = required_id(args, "category_id")?;
    let configured_name = required_string(args, "configured_name")?;
    let urls = required_string_list(args, "urls", "URL")?;
    let target = ServiceTarget::from_args(args)?;

    let client = ctx.client(&target)?;
    let updated = client
        .url_categories()
        .add_urls_to_category(&category_id, &configured_name, &urls)
        .await
        .into_result(
            &format!("add URLs to category {category_id}"),
            Some(category_id.as_str()),
        )?;
    Ok(ToolOutput::resource(updated))
}

pub(super) async fn remove_urls_from_category(
    ctx: &ToolContext,
    args: &Map<String, Value>,
    call: CallContext,
) -> Result<ToolOutput, ToolError> {
    let category_id = required_id(args, "category_id")?;
    let configured_name = required_string(args, "configured_name")?;
    let urls = required_string_list(args, "urls", "URL")?;
    let target = ServiceTarget::from_args(args)?;

    let mut context = Map::new();
    context.insert("category_id".into(), json!(category_id));
    context.insert("configured_name".into(), json!(configured_name));
    context.insert("urls".into(), json!(urls));
    if let Some(pending) =
        check_confirmation("zia_remove_urls_from_category", call.confirmed, &context)
    {
        return Ok(ToolOutput::Pending(pending));
    }

    let client = ctx.client(&target)?;
    let updated = client
        .url_categories()
        .delete_urls_from_category(&category_id, &configured_name, &urls)
        .await
        .into_result(
            &format!("remove URLs from category {category_id}"),
            Some(category_id.as_str()),
        )?;
    Ok(ToolOutput::resource(updated))
}

pub(super) async fn delete_url_category(
    ctx: &ToolContext,
    args: &Map<String, Value>,
    call: CallContext,
) -> Result<ToolOutput, ToolError> {
    let category_id = required_id(args, "category_id")?;
    let target = ServiceTarget::from_args(args)?;

    let mut context = Map::new();
    context.insert("category_id".into(), json!(category_id));
    if let Some(pending) =
        check_confirmation("zia_delete_url_category", call.confirmed, &context)
    {
        return Ok(ToolOutput::Pending(pending));
    }

    let client = ctx.client(&target)?;
    client
        .url_categories()
        .delete_category(&category_id)
        .await
        .into_status(
            &format!("delete URL category {category_id}"),
            Some(category_id.as_str()),
        )?;
    Ok(ToolOutput::Status(format!("Deleted URL category {category_id}")))
}
