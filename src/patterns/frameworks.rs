//! Built-in framework overlays. Each document is merged onto the language
//! layer named next to it.

pub const LARAVEL: &str = r##"
[SQL_INJECTION]
description: Raw query builders with interpolated input
patterns:
- DB::raw\s*\(\s*.*\$
- ->whereRaw\s*\(\s*.*\$
- DB::(select|statement)\s*\(\s*["'].*\$

[ELOQUENT_INJECTION]
description: Raw Eloquent clauses
patterns:
- ->(orderByRaw|havingRaw|selectRaw)\s*\(\s*.*\$

[MASS_ASSIGNMENT]
description: Unguarded models or full request input
patterns:
- \$guarded\s*=\s*\[\s*\]
- ::create\s*\(\s*\$request->all\(\)
"##;

pub const SYMFONY: &str = r##"
[SQL_INJECTION]
description: DQL assembled by concatenation
patterns:
- createQuery\s*\(\s*["'].*["']\s*\.\s*\$

[XSS]
description: Twig raw filter
patterns:
- \|\s*raw\b
"##;

pub const DJANGO: &str = r##"
[SQL_INJECTION]
description: Raw SQL through the ORM
patterns:
- \.raw\s*\(\s*f?["'].*(%|\{)
- \.extra\s*\(

[XSS]
description: Escaping disabled
patterns:
- mark_safe\s*\(
- \|\s*safe\b

[CSRF]
description: CSRF protection disabled
patterns:
- @csrf_exempt
"##;

pub const FLASK: &str = r##"
[XSS]
description: Templates rendered from strings
patterns:
- render_template_string\s*\(

[SENSITIVE_DATA_EXPOSURE]
description: Debug mode in production
patterns:
- \.run\s*\(.*debug\s*=\s*True
"##;

pub const SPRING: &str = r##"
[SQL_INJECTION]
description: Native queries with concatenation
patterns:
- @Query\s*\(.*\+
- jdbcTemplate\.(query|update|execute)\s*\(\s*.*\+

[CSRF]
description: CSRF protection disabled
patterns:
- csrf\(\)\.disable\(\)
"##;

pub const RAILS: &str = r##"
[MASS_ASSIGNMENT]
description: Unfiltered params
patterns:
- params\.permit!
- \.(new|create|update)\s*\(\s*params\[

[XSS]
description: Escaping bypassed
patterns:
- \.html_safe\b
- \braw\s*\(

[CSRF]
description: Forgery protection skipped
patterns:
- skip_before_action\s+:verify_authenticity_token
"##;

pub const EXPRESS: &str = r##"
[XSS]
description: Request data sent without encoding
patterns:
- res\.send\s*\(\s*.*req\.(query|body|params)

[PATH_TRAVERSAL]
description: Files served from request paths
patterns:
- res\.sendFile\s*\(\s*.*req\.
"##;

pub const GIN: &str = r##"
[XSS]
description: Unescaped HTML from request values
patterns:
- c\.(Data|String)\s*\(.*c\.(Query|Param|PostForm)
"##;
