// ABOUTME: HTML assembly for responsive image markup
// ABOUTME: Pure templating over a sizing plan, placeholder, and link context

use crate::options::TransformOptions;
use crate::planner::SizingPlan;

/// Everything the assembler needs to render one image. The sizing plan is the
/// sole source of truth for srcset/sizes; nothing here recomputes sizing.
#[derive(Debug)]
pub struct RenderInputs<'a> {
    pub plan: &'a SizingPlan,
    /// Inline `data:` URI used as the blur-up background
    pub placeholder: &'a str,
    /// Canonical asset URL, used as the fallback `src` and the link target
    pub original_url: &'a str,
    pub alt: Option<&'a str>,
    pub title: Option<&'a str>,
    /// The markdown already wraps this image in a link
    pub is_in_link: bool,
    /// The image sits inline next to text or another image
    pub is_inline: bool,
    /// Style-declared link target, which always wins
    pub link: Option<&'a str>,
    pub link_target: &'a str,
}

/// Render the final markup fragment for one image.
pub fn render(inputs: &RenderInputs<'_>, options: &TransformOptions) -> String {
    let plan = inputs.plan;

    // Alt text keeps only the part before the first dot, dropping pasted
    // filename suffixes like "image.png"
    let alt = inputs
        .alt
        .map(|a| a.split('.').next().unwrap_or(""))
        .unwrap_or("");
    let alt = escape_attr(alt);
    let title = escape_attr(inputs.title.unwrap_or(""));
    let fallback_src = escape_attr(inputs.original_url);
    let sizes = escape_attr(&plan.sizes);
    let srcset = escape_attr(&plan.srcset());

    let img_style = format!(
        "width: 100%; height: 100%; margin: 0; vertical-align: middle; \
         position: absolute; top: 0; left: 0; \
         box-shadow: inset 0px 0px 0px 400px {};",
        options.background_color
    );

    let image_tag = match plan.webp_srcset() {
        Some(webp_srcset) => format!(
            "<picture>\n\
             <source srcset=\"{webp_srcset}\" sizes=\"{sizes}\" type=\"image/webp\"/>\n\
             <source srcset=\"{srcset}\" sizes=\"{sizes}\"/>\n\
             <img class=\"yuque-resp-image-image\" style=\"{img_style}\" \
             alt=\"{alt}\" title=\"{title}\" src=\"{fallback_src}\"/>\n\
             </picture>",
            webp_srcset = escape_attr(&webp_srcset),
        ),
        None => format!(
            "<img class=\"yuque-resp-image-image\" style=\"{img_style}\" \
             alt=\"{alt}\" title=\"{title}\" src=\"{fallback_src}\" \
             srcset=\"{srcset}\" sizes=\"{sizes}\"/>"
        ),
    };

    let inline_style = if inputs.is_inline {
        format!(
            "display: inline-block; width: {}px; vertical-align: top; ",
            plan.presentation_width
        )
    } else {
        String::new()
    };

    let wrapper = format!(
        "<span class=\"yuque-resp-image-wrapper\" \
         style=\"position: relative; display: block; max-width: {max_width}px; \
         margin-left: auto; margin-right: auto; {inline_style}{wrapper_style}\">\n\
         <span class=\"yuque-resp-image-background-image\" \
         style=\"padding-bottom: {padding}%; position: relative; bottom: 0; left: 0; \
         background-image: url('{placeholder}'); background-size: cover; display: block;\">\
         </span>\n\
         {image_tag}\n\
         </span>",
        max_width = plan.presentation_width,
        wrapper_style = options.wrapper_style,
        padding = plan.padding_bottom_percent(),
        placeholder = inputs.placeholder,
    );

    // A style-declared link always wraps; otherwise link to the original
    // unless the markdown already wrapped this image in a link
    if let Some(link) = inputs.link {
        format!(
            "<a class=\"yuque-resp-image-link\" href=\"{href}\" \
             style=\"display: block\" target=\"{target}\" rel=\"noopener\">\n\
             {wrapper}\n\
             </a>",
            href = escape_attr(link),
            target = escape_attr(inputs.link_target),
        )
    } else if !inputs.is_in_link && options.link_images_to_original {
        format!(
            "<a class=\"yuque-resp-image-link\" href=\"{href}\" \
             style=\"display: {display}\" target=\"_blank\" rel=\"noopener\">\n\
             {wrapper}\n\
             </a>",
            href = fallback_src,
            display = if inputs.is_inline { "inline-block" } else { "block" },
        )
    } else {
        wrapper
    }
}

/// Minimal HTML attribute escaping.
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_url::ImageStyles;
    use crate::metadata::ImageMetadata;
    use crate::options::WebpMode;
    use crate::planner::{plan, PlannerOptions};

    const BASE: &str = "https://cdn.nlark.com/yuque/0/1/x.png";

    fn sizing_plan(options: &TransformOptions) -> SizingPlan {
        let metadata = ImageMetadata {
            width: 1200,
            height: 600,
            density: None,
            file_size: Some(50000),
        };
        let planner_options = PlannerOptions::derive(options, &ImageStyles::default());
        plan(&metadata, BASE, &planner_options).unwrap()
    }

    fn inputs<'a>(plan: &'a SizingPlan) -> RenderInputs<'a> {
        RenderInputs {
            plan,
            placeholder: "data:image/png;base64,dGlueQ==",
            original_url: BASE,
            alt: Some("diagram.png"),
            title: None,
            is_in_link: false,
            is_inline: false,
            link: None,
            link_target: "_blank",
        }
    }

    #[test]
    fn test_render_without_webp() {
        let options = TransformOptions {
            with_webp: WebpMode::Toggle(false),
            ..Default::default()
        };
        let plan = sizing_plan(&options);
        let html = render(&inputs(&plan), &options);

        assert!(html.contains("<img class=\"yuque-resp-image-image\""));
        assert!(!html.contains("<picture>"));
        assert!(html.contains("srcset=\""));
        assert!(html.contains("sizes=\"(max-width: 746px) 100vw, 746px\""));
        assert!(html.contains("max-width: 746px"));
        assert!(html.contains("padding-bottom: 50%"));
        assert!(html.contains("background-image: url('data:image/png;base64,dGlueQ==')"));
        // Linked to the original by default
        assert!(html.contains("<a class=\"yuque-resp-image-link\""));
        assert!(html.contains(&format!("href=\"{}\"", BASE)));
    }

    #[test]
    fn test_render_with_webp_uses_picture() {
        let options = TransformOptions::default();
        let plan = sizing_plan(&options);
        let html = render(&inputs(&plan), &options);

        assert!(html.contains("<picture>"));
        assert!(html.contains("type=\"image/webp\""));
        assert!(html.contains("/format,webp"));
        // Fallback img inside the picture has no srcset of its own
        let img_tag = html
            .split("<img")
            .nth(1)
            .expect("picture contains an img tag");
        assert!(!img_tag.contains("srcset"));
    }

    #[test]
    fn test_alt_truncated_at_first_dot_and_escaped() {
        let options = TransformOptions::default();
        let plan = sizing_plan(&options);

        let mut rendered_inputs = inputs(&plan);
        rendered_inputs.alt = Some("chart \"v2\".png");
        let html = render(&rendered_inputs, &options);

        assert!(html.contains("alt=\"chart &quot;v2&quot;\""));
        assert!(!html.contains("alt=\"chart \"v2\".png\""));
    }

    #[test]
    fn test_in_link_image_is_not_wrapped() {
        let options = TransformOptions::default();
        let plan = sizing_plan(&options);

        let mut rendered_inputs = inputs(&plan);
        rendered_inputs.is_in_link = true;
        let html = render(&rendered_inputs, &options);

        assert!(!html.contains("<a "));
        assert!(html.starts_with("<span class=\"yuque-resp-image-wrapper\""));
    }

    #[test]
    fn test_link_wrapping_disabled() {
        let options = TransformOptions {
            link_images_to_original: false,
            ..Default::default()
        };
        let plan = sizing_plan(&options);
        let html = render(&inputs(&plan), &options);

        assert!(!html.contains("<a "));
    }

    #[test]
    fn test_style_declared_link_wins() {
        let options = TransformOptions::default();
        let plan = sizing_plan(&options);

        let mut rendered_inputs = inputs(&plan);
        rendered_inputs.is_in_link = true;
        rendered_inputs.link = Some("https://example.com/docs");
        rendered_inputs.link_target = "_self";
        let html = render(&rendered_inputs, &options);

        assert!(html.contains("href=\"https://example.com/docs\""));
        assert!(html.contains("target=\"_self\""));
    }

    #[test]
    fn test_inline_image_styling() {
        let options = TransformOptions::default();
        let plan = sizing_plan(&options);

        let mut rendered_inputs = inputs(&plan);
        rendered_inputs.is_inline = true;
        let html = render(&rendered_inputs, &options);

        assert!(html.contains("display: inline-block; width: 746px; vertical-align: top;"));
        assert!(html.contains("style=\"display: inline-block\""));
    }

    #[test]
    fn test_wrapper_style_appended() {
        let options = TransformOptions {
            wrapper_style: "border: 1px solid red;".to_string(),
            ..Default::default()
        };
        let plan = sizing_plan(&options);
        let html = render(&inputs(&plan), &options);

        assert!(html.contains("margin-right: auto; border: 1px solid red;\""));
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr("a & b"), "a &amp; b");
        assert_eq!(escape_attr("<script>"), "&lt;script&gt;");
        assert_eq!(escape_attr("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(escape_attr("plain"), "plain");
    }
}
