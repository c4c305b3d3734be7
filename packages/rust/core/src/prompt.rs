//! Instruction text sent to the extraction model.

use firmscope_shared::{Product, Service, StructuredRecord};

/// Built-in extraction requirements, replaceable through `llm.requirements_file`.
pub const DEFAULT_REQUIREMENTS: &str = "\
Extract company information organized into three sections.

1. COMPANY INFORMATION
- logo: company logo found in the website header or media kit
- name: complete, official company name without abbreviations
- headline: short value statement used prominently on the website
- description: mission, core activities and target market
- company_type: legal or organizational type (technology company, corporate, ...)
- service_or_product: whether the company is product-based, service-based, or both
- video_url: link to a company introduction video
- headquarter: country of the headquarters
- city: city of the main office
- employee_count: most recent estimate of full-time employees
- founded_year: year the company was established
- business_model: B2B, B2C, B2B2C, C2C, ...
- women_founded: whether any founder is a woman
- industry, sub_industry, solution_area: chosen with the sector tools
- tags: hashtags highlighting the company focus
- active_customers: well-known brands using the company offerings
- available_countries: countries where the company is present

2. SERVICES
For each service: name and a description of what it does and the value it provides.

3. PRODUCTS
For each product: logo, name, headline, description, video, founded year, business
model, industry, sub-industry and solution area (chosen with the sector tools),
screenshots, how it works (5 steps max), value proposition (240 chars max), use case
title and description (240 chars), case study title, customer name and description,
statistics title and value, active customers, customer logos, available countries,
integrations and partnerships.
";

const ROLE: &str = "\
You are a company information extraction specialist. You analyze text crawled from \
a company website, possibly in English or Turkish, and organize what you find into \
a structured JSON record.";

const GUIDELINES: &str = "\
Analysis guidelines:
- Read all of the provided content; it comes from several pages of one website.
- Cross-reference facts across pages and prefer official statements.
- Copy names and figures verbatim rather than paraphrasing.
- Pay attention to About, Products, Services and Contact pages.

Sector selection:
- First call get_sector_recommendations_for_company with the company description.
- If more options are needed, call search_sectors_by_keywords with relevant terms.
- Only use industry, sub-industry and solution area names returned by these tools.

Output:
- Respond with a single valid JSON object and nothing else.
- Every value is a string or null; use null when the information is not available.";

/// Full system prompt for the given requirements.
pub fn system_prompt(requirements: &str) -> String {
    format!(
        "{ROLE}\n\n{}\n\n{GUIDELINES}\n\nThe JSON object must have exactly this shape:\n{}",
        requirements.trim(),
        output_shape()
    )
}

/// User message wrapping the crawled website text.
pub fn user_prompt(website_text: &str) -> String {
    format!(
        "Analyze the following website content and extract the company information.\n\n\
         WEBSITE CONTENT:\n{website_text}\n\n\
         Return only the JSON object."
    )
}

/// A record with one empty service and product, rendered as the expected shape.
fn output_shape() -> String {
    let skeleton = StructuredRecord {
        services: vec![Service::default()],
        products: vec![Product::default()],
        ..StructuredRecord::default()
    };
    serde_json::to_string_pretty(&skeleton).unwrap_or_default()
}
