/// Built-in JavaScript / TypeScript signatures.
pub const DOCUMENT: &str = r##"
[XSS]
description: DOM sinks fed with dynamic content
patterns:
- \.innerHTML\s*=
- \.outerHTML\s*=
- document\.write\s*\(
- dangerouslySetInnerHTML

[REMOTE_CODE_EXECUTION]
description: Dynamic code evaluation
patterns:
- \beval\s*\(
- new\s+Function\s*\(
- set(Timeout|Interval)\s*\(\s*["'`]

[COMMAND_INJECTION]
description: child_process with variable input
patterns:
- child_process
- \bexecSync\s*\(
- \bexec\s*\(\s*.*\+

[SQL_INJECTION]
description: Query strings built by concatenation or templates
patterns:
- \.query\s*\(\s*["'`].*(\+|\$\{)

[PATH_TRAVERSAL]
description: File access built from request data
patterns:
- fs\.(readFile|readFileSync|createReadStream)\s*\(\s*.*req\.
"##;
