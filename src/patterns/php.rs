/// Built-in PHP signatures.
pub const DOCUMENT: &str = r##"
[SQL_INJECTION]
description: SQL built from request data or string concatenation
patterns:
- mysql_query\s*\(\s*.*\$.*\)
- mysqli_query\s*\(\s*.*\$.*\)
- ->query\s*\(\s*["'].*\$
- pg_query\s*\(\s*.*\$.*\)

[COMMAND_INJECTION]
description: Shell command execution with variable input
patterns:
- \b(system|shell_exec|exec|passthru|popen|proc_open)\s*\(\s*.*\$
- `.*\$.*`

[REMOTE_CODE_EXECUTION]
description: Dynamic code evaluation
patterns:
- \beval\s*\(
- \bcreate_function\s*\(
- preg_replace\s*\(\s*["'].*/e["']
- \bassert\s*\(\s*\$

[INSECURE_DESERIALIZATION]
description: unserialize() on untrusted data
patterns:
- \bunserialize\s*\(\s*\$

[XSS]
description: Request data echoed without escaping
patterns:
- \b(echo|print)\s+.*\$_(GET|POST|REQUEST|COOKIE)

[PATH_TRAVERSAL]
description: File access built from request data
patterns:
- \b(include|require|include_once|require_once)\s*\(?\s*.*\$_(GET|POST|REQUEST)
- \b(fopen|file_get_contents|readfile|unlink)\s*\(\s*.*\$_(GET|POST|REQUEST)
"##;
