use std::fmt::Write;

use crate::context::InvocationContext;
use crate::inbound::InboundRequest;

const BOOTSTRAP_CSS: &str = "https://maxcdn.bootstrapcdn.com/bootstrap/4.4.1/css/bootstrap.min.css";

pub fn escape_html(raw: &str) -> String {
  let mut escaped = String::with_capacity(raw.len());

  for c in raw.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      _ => escaped.push(c),
    }
  }

  escaped
}

/// The page every error response is rendered through.
pub fn render(url: &str, label: &str, description: &str, app_name: &str) -> String {
  format!(
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <link rel="stylesheet" href="{css}">
    <title>General Error Message</title>
</head>
<body>
    <div class="jumbotron">
        <h1 class="display-4">{app_name}</h1>
        <h4 class="lead"><pre><b>{label}</b></pre></h4>
    </div>
    <div class="container-fluid">
        <h3><a style="color:red">{description}</a></h3>
    </div>
    <br />
    <br />
    <div class="container-fluid">
        <h3><a href="{url}">Click here to access the same function on the target system</a></h3>
    </div>
</body>
</html>
"#,
    css = BOOTSTRAP_CSS,
    app_name = escape_html(app_name),
    label = escape_html(label),
    description = escape_html(description),
    url = escape_html(url),
  )
}

pub fn render_dump(inbound: &InboundRequest, context: &InvocationContext) -> String {
  let event = serde_json::to_string_pretty(inbound).unwrap_or_else(|err| format!("{:?} ({})", inbound, err));

  let mut details = String::new();
  // Writing into a String cannot fail.
  let _ = writeln!(details, "Lambda function name: {:?}", context.function_name);
  let _ = writeln!(details, "Lambda function version: {:?}", context.function_version);
  let _ = writeln!(details, "Lambda function ARN: {:?}", context.invoked_function_arn);
  let _ = writeln!(details, "CloudWatch log stream name: {:?}", context.log_stream_name);
  let _ = writeln!(details, "CloudWatch log group name: {:?}", context.log_group_name);
  let _ = writeln!(details, "Lambda Request ID: {:?}", context.aws_request_id);
  let _ = writeln!(details, "Lambda function memory limits in MB: {}", context.memory_limit_in_mb);
  let _ = writeln!(details, "Lambda time remaining in MS: {}", context.remaining_time_millis());

  format!(
    "<!DOCTYPE html><html><body><hr /><div><pre>{}\n<hr />{}\n<hr /></pre></div></body></html>",
    escape_html(&event),
    escape_html(&details),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::FunctionMetadata;

  #[test]
  fn page_contains_every_field() {
    let page = render("https://example.com/a?b=1", "Oops", "Connection failed", "Shop");

    assert!(page.contains("<h1 class=\"display-4\">Shop</h1>"));
    assert!(page.contains("<b>Oops</b>"));
    assert!(page.contains("Connection failed"));
    assert!(page.contains("href=\"https://example.com/a?b=1\""));
  }

  #[test]
  fn interpolated_values_are_escaped() {
    let page = render("https://example.com/\"><script>", "<b>", "a & b", "App");

    assert!(!page.contains("<script>"));
    assert!(page.contains("&lt;script&gt;"));
    assert!(page.contains("a &amp; b"));
  }

  #[test]
  fn dump_lists_context_details() {
    let metadata = FunctionMetadata::from_lookup(|_| None);
    let context = InvocationContext::local(&metadata, std::time::Duration::from_secs(3));
    let mut inbound = InboundRequest::default();
    inbound.raw_path = "/dumped/path".into();

    let page = render_dump(&inbound, &context);

    assert!(page.contains(&context.aws_request_id));
    assert!(page.contains(&context.function_name));
    assert!(page.contains("/dumped/path"));
    assert!(page.contains("Lambda function memory limits in MB: 128"));
  }
}
