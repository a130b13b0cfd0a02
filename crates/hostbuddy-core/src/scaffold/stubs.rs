//! Minimal stand-ins for the conventional `@/components/ui/*` kit so sources
//! written against it still build.

/// Marker that triggers stub generation.
pub const UI_KIT_ALIAS: &str = "@/components/ui/";

/// Directory (relative to the scaffold root) the stubs are written to.
pub const UI_KIT_DIR: &str = "components/ui";

const CN: &str = "function cn(...c: Array<string | undefined>) { return c.filter(Boolean).join(' '); }\n";

/// `(file name, contents)` for every stub module.
pub fn ui_kit_stubs() -> Vec<(&'static str, String)> {
    vec![
        ("card.tsx", format!(
            "import React from 'react';\n{CN}\
export function Card({{ className, ...rest }}: React.HTMLAttributes<HTMLDivElement>) {{ return <div className={{cn('bg-white rounded-xl border border-slate-200 shadow-sm', className)}} {{...rest}} />; }}\n\
export function CardHeader({{ className, ...rest }}: React.HTMLAttributes<HTMLDivElement>) {{ return <div className={{cn('px-4 pt-4', className)}} {{...rest}} />; }}\n\
export function CardContent({{ className, ...rest }}: React.HTMLAttributes<HTMLDivElement>) {{ return <div className={{cn('px-4 pb-4', className)}} {{...rest}} />; }}\n\
export function CardTitle({{ className, ...rest }}: React.HTMLAttributes<HTMLHeadingElement>) {{ return <h3 className={{cn('font-semibold tracking-tight', className)}} {{...rest}} />; }}\n"
        )),
        ("button.tsx", format!(
            "import React from 'react';\n{CN}\
type Props = React.ButtonHTMLAttributes<HTMLButtonElement> & {{ variant?: 'default' | 'secondary' | 'destructive' }};\n\
export function Button({{ variant = 'default', className, ...rest }}: Props) {{\n\
  const base = 'inline-flex items-center justify-center gap-2 px-3 py-2 text-sm font-medium rounded-md transition-colors';\n\
  const variants: Record<string, string> = {{\n\
    default: 'bg-slate-900 text-white hover:bg-slate-800',\n\
    secondary: 'bg-slate-100 text-slate-900 hover:bg-slate-200',\n\
    destructive: 'bg-red-600 text-white hover:bg-red-700'\n\
  }};\n\
  return <button className={{cn(base, variants[variant], className)}} {{...rest}} />;\n\
}}\n"
        )),
        ("input.tsx", format!(
            "import React from 'react';\n{CN}\
export function Input({{ className, ...props }}: React.InputHTMLAttributes<HTMLInputElement>) {{ return <input className={{cn('w-full rounded-md border border-slate-300 bg-white px-3 py-2 text-sm', className)}} {{...props}} />; }}\n"
        )),
        ("textarea.tsx", format!(
            "import React from 'react';\n{CN}\
export function Textarea({{ className, ...props }}: React.TextareaHTMLAttributes<HTMLTextAreaElement>) {{ return <textarea className={{cn('w-full rounded-md border border-slate-300 bg-white px-3 py-2 text-sm', className)}} {{...props}} />; }}\n"
        )),
        ("label.tsx", format!(
            "import React from 'react';\n{CN}\
export function Label({{ className, ...props }}: React.LabelHTMLAttributes<HTMLLabelElement>) {{ return <label className={{cn('text-sm font-medium text-slate-700', className)}} {{...props}} />; }}\n"
        )),
        ("tabs.tsx", "import React from 'react';\n\
type TabsContextType = { value: string; setValue: (v: string) => void };\n\
const Ctx = React.createContext<TabsContextType | null>(null);\n\
export function Tabs({ defaultValue = '', value: controlled, onValueChange, children }: any) {\n\
  const [uncontrolled, setUnc] = React.useState(defaultValue);\n\
  const value = controlled ?? uncontrolled;\n\
  const setValue = (v: string) => { setUnc(v); onValueChange?.(v); };\n\
  return <Ctx.Provider value={{ value, setValue }}>{children}</Ctx.Provider>;\n\
}\n\
export function TabsList({ className, ...rest }: React.HTMLAttributes<HTMLDivElement>) { return <div className={className} {...rest} />; }\n\
export function TabsTrigger({ value, children }: any) { const ctx = React.useContext(Ctx)!; const active = ctx.value === value; return <button onClick={() => ctx.setValue(value)} className={(active ? 'bg-slate-900 text-white' : 'bg-slate-100 text-slate-900') + ' rounded-md px-3 py-1 text-sm mr-2'}>{children}</button>; }\n\
export function TabsContent({ value, children }: any) { const ctx = React.useContext(Ctx)!; if (ctx.value !== value) return null; return <div>{children}</div>; }\n"
            .to_string()),
        ("switch.tsx", "import React from 'react';\n\
export function Switch({ checked, onChange, ...rest }: React.InputHTMLAttributes<HTMLInputElement>) { return <input type=\"checkbox\" checked={!!checked} onChange={onChange as any} {...rest} />; }\n"
            .to_string()),
    ]
}

/// Whether `source` imports anything from the UI-kit alias.
pub fn references_ui_kit(source: &str) -> bool {
    source.contains(UI_KIT_ALIAS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_set_covers_common_primitives() {
        let names: Vec<&str> = ui_kit_stubs().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["card.tsx", "button.tsx", "input.tsx", "textarea.tsx", "label.tsx", "tabs.tsx", "switch.tsx"]
        );
    }

    #[test]
    fn test_stubs_export_expected_components() {
        let stubs = ui_kit_stubs();
        let card = &stubs[0].1;
        assert!(card.contains("export function CardTitle"));
        assert!(card.contains("function cn("));
        assert!(!card.contains("{{"));
        let tabs = &stubs[5].1;
        assert!(tabs.contains("export function TabsTrigger"));
    }

    #[test]
    fn test_references_ui_kit() {
        assert!(references_ui_kit("import { Button } from '@/components/ui/button';"));
        assert!(!references_ui_kit("import { Button } from './button';"));
    }
}
